use std::time::SystemTime;

use fxhash::FxHashMap;

/// Options handed to a provider when opening a file system.
///
/// Keys follow the archive provider's vocabulary (`create`, `defaultOwner`,
/// `defaultGroup`, `compressionMethod`). See [`crate::config::ArchiveOptions`]
/// for a typed view.
pub type Env = FxHashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::Read => write!(f, "READ"),
            AccessMode::Write => write!(f, "WRITE"),
            AccessMode::Execute => write!(f, "EXECUTE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Basic attributes of a file or archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub kind: FileKind,
    pub size: u64,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl Attributes {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

/// Timestamps to apply to a path. `None` leaves the corresponding time untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryTimes {
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
}

impl EntryTimes {
    /// All three timestamps set to the same instant.
    pub fn all(time: SystemTime) -> Self {
        EntryTimes {
            created: Some(time),
            modified: Some(time),
            accessed: Some(time),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `AlreadyExists` if the target exists.
    CreateNew,
    /// Overwrite an existing regular file.
    Replace,
}

/// Order in which a walk yields siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkOrder {
    /// Whatever order the provider enumerates entries in.
    #[default]
    Natural,
    /// Siblings sorted by name, giving the same sequence on every run.
    Sorted,
}
