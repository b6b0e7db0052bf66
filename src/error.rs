use thiserror::Error;

use crate::vfs::AccessMode;

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("No such file: {0}")]
    NotFound(String),

    #[error("Access denied ({modes:?}): {path}")]
    PermissionDenied { path: String, modes: Vec<AccessMode> },

    #[error("Invalid value '{value}' for option '{key}'")]
    InvalidOption { key: String, value: String },

    #[error("{path} is not a path of the {expected} provider")]
    ProviderMismatch { expected: &'static str, path: String },

    #[error("Read-only file system: {0}")]
    ReadOnly(String),

    #[error("File system is closed: {0}")]
    Closed(String),

    #[error("File system already mounted: {0}")]
    AlreadyMounted(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Operation '{op}' is not supported by the {scheme} provider")]
    Unsupported { op: &'static str, scheme: String },

    #[error("Invalid archive locator: {0}")]
    InvalidLocator(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /// Wraps this error with a message naming the path or locator involved.
    pub fn context(self, context: impl Into<String>) -> Self {
        ArchiveError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any added context.
    pub fn root_cause(&self) -> &ArchiveError {
        let mut current = self;
        while let ArchiveError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_already_exists(&self) -> bool {
        match self.root_cause() {
            ArchiveError::AlreadyExists(_) => true,
            ArchiveError::Io(e) => e.kind() == std::io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self.root_cause() {
            ArchiveError::NotFound(_) => true,
            ArchiveError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self.root_cause() {
            ArchiveError::PermissionDenied { .. } => true,
            ArchiveError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for ArchiveError {
    fn from(err: toml::de::Error) -> Self {
        ArchiveError::Config(err.to_string())
    }
}

/// Attaches path or locator context to a fallible call.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<ArchiveError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
