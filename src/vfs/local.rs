//! The host file system exposed through the provider traits (scheme `file`).

use std::any::Any;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use nix::errno::Errno;
use nix::unistd::AccessFlags;
use walkdir::WalkDir;

use super::{
    AccessMode, Attributes, EntryTimes, Env, FileKind, FileSystem, FileSystemProvider,
    FileSystemRef, PathRef, ProviderRef, VirtualPath, WalkOrder, WriteMode,
};
use crate::error::{ArchiveError, Result};

pub const FILE_SCHEME: &str = "file";

static DEFAULT_FILE_SYSTEM: LazyLock<Arc<LocalFileSystem>> = LazyLock::new(LocalFileSystem::new);

/// The process-wide host file system.
pub fn default_file_system() -> Arc<LocalFileSystem> {
    Arc::clone(&DEFAULT_FILE_SYSTEM)
}

/// A host path bound to the default file system.
pub fn local_path(path: impl AsRef<Path>) -> PathRef {
    Arc::new(LocalPath {
        fs: default_file_system(),
        path: path.as_ref().to_path_buf(),
    })
}

#[derive(Debug, Default)]
pub struct LocalProvider;

#[derive(Debug)]
pub struct LocalFileSystem {
    provider: Arc<LocalProvider>,
}

impl LocalFileSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(LocalFileSystem {
            provider: Arc::new(LocalProvider),
        })
    }
}

impl FileSystem for LocalFileSystem {
    fn provider(&self) -> ProviderRef {
        self.provider.clone()
    }

    fn close(&self) -> Result<()> {
        Err(ArchiveError::Unsupported {
            op: "close",
            scheme: FILE_SCHEME.to_string(),
        })
    }

    fn is_open(&self) -> bool {
        true
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn root_directories(self: Arc<Self>) -> Vec<PathRef> {
        vec![self.path("/")]
    }

    fn path(self: Arc<Self>, path: &str) -> PathRef {
        Arc::new(LocalPath {
            fs: self,
            path: PathBuf::from(path),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct LocalPath {
    fs: Arc<LocalFileSystem>,
    path: PathBuf,
}

impl LocalPath {
    fn sibling(&self, path: PathBuf) -> PathRef {
        Arc::new(LocalPath {
            fs: Arc::clone(&self.fs),
            path,
        })
    }
}

impl fmt::Debug for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalPath").field(&self.path).finish()
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl VirtualPath for LocalPath {
    fn file_system(&self) -> FileSystemRef {
        self.fs.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, other: &str) -> PathRef {
        self.sibling(self.path.join(other))
    }

    fn parent(&self) -> Option<PathRef> {
        self.path
            .parent()
            .map(|parent| self.sibling(parent.to_path_buf()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcast `path` to a host path, rejecting proxies and foreign path types.
fn host_path(path: &PathRef) -> Result<&Path> {
    path.as_any()
        .downcast_ref::<LocalPath>()
        .map(|local| local.path.as_path())
        .ok_or_else(|| ArchiveError::ProviderMismatch {
            expected: FILE_SCHEME,
            path: path.to_string(),
        })
}

fn map_io(err: io::Error, path: &Path) -> ArchiveError {
    let display = path.display().to_string();
    match err.kind() {
        io::ErrorKind::NotFound => ArchiveError::NotFound(display),
        io::ErrorKind::AlreadyExists => ArchiveError::AlreadyExists(display),
        io::ErrorKind::PermissionDenied => ArchiveError::PermissionDenied {
            path: display,
            modes: vec![],
        },
        _ => ArchiveError::Io(err).context(display),
    }
}

fn access_flags(modes: &[AccessMode]) -> AccessFlags {
    if modes.is_empty() {
        return AccessFlags::F_OK;
    }
    modes.iter().fold(AccessFlags::empty(), |flags, mode| {
        flags
            | match mode {
                AccessMode::Read => AccessFlags::R_OK,
                AccessMode::Write => AccessFlags::W_OK,
                AccessMode::Execute => AccessFlags::X_OK,
            }
    })
}

fn to_attributes(metadata: &fs::Metadata) -> Attributes {
    let kind = if metadata.is_dir() {
        FileKind::Directory
    } else if metadata.is_file() {
        FileKind::File
    } else if metadata.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::Other
    };
    let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
    Attributes {
        kind,
        size: metadata.len(),
        created: metadata.created().unwrap_or(modified),
        modified,
        accessed: metadata.accessed().unwrap_or(modified),
    }
}

impl FileSystemProvider for LocalProvider {
    fn scheme(&self) -> &str {
        FILE_SCHEME
    }

    fn new_file_system(&self, path: &PathRef, _env: &Env) -> Result<FileSystemRef> {
        Err(ArchiveError::Unsupported {
            op: "new_file_system",
            scheme: FILE_SCHEME.to_string(),
        }
        .context(path.to_string()))
    }

    fn check_access(&self, path: &PathRef, modes: &[AccessMode]) -> Result<()> {
        let host = host_path(path)?;
        match nix::unistd::access(host, access_flags(modes)) {
            Ok(()) => Ok(()),
            Err(Errno::ENOENT | Errno::ENOTDIR) => {
                Err(ArchiveError::NotFound(host.display().to_string()))
            }
            Err(Errno::EACCES | Errno::EPERM | Errno::EROFS) => {
                Err(ArchiveError::PermissionDenied {
                    path: host.display().to_string(),
                    modes: modes.to_vec(),
                })
            }
            Err(errno) => Err(map_io(io::Error::from(errno), host)),
        }
    }

    fn read_attributes(&self, path: &PathRef) -> Result<Attributes> {
        let host = host_path(path)?;
        let metadata = fs::metadata(host).map_err(|e| map_io(e, host))?;
        Ok(to_attributes(&metadata))
    }

    fn set_times(&self, path: &PathRef, times: EntryTimes) -> Result<()> {
        let host = host_path(path)?;
        let mut file_times = fs::FileTimes::new();
        if let Some(modified) = times.modified {
            file_times = file_times.set_modified(modified);
        }
        if let Some(accessed) = times.accessed {
            file_times = file_times.set_accessed(accessed);
        }
        // Creation time cannot be changed on Linux; it is left as is.
        File::open(host)
            .and_then(|file| file.set_times(file_times))
            .map_err(|e| map_io(e, host))
    }

    fn create_directory(&self, dir: &PathRef) -> Result<()> {
        let host = host_path(dir)?;
        fs::create_dir(host).map_err(|e| map_io(e, host))
    }

    fn read(&self, path: &PathRef) -> Result<Vec<u8>> {
        let host = host_path(path)?;
        fs::read(host).map_err(|e| map_io(e, host))
    }

    fn write(&self, path: &PathRef, data: &[u8], mode: WriteMode) -> Result<()> {
        let host = host_path(path)?;
        let mut options = OpenOptions::new();
        options.write(true);
        match mode {
            WriteMode::CreateNew => options.create_new(true),
            WriteMode::Replace => options.create(true).truncate(true),
        };
        options
            .open(host)
            .and_then(|mut file| file.write_all(data))
            .map_err(|e| map_io(e, host))
    }

    fn delete(&self, path: &PathRef) -> Result<()> {
        let host = host_path(path)?;
        let metadata = fs::symlink_metadata(host).map_err(|e| map_io(e, host))?;
        if metadata.is_dir() {
            fs::remove_dir(host).map_err(|e| map_io(e, host))
        } else {
            fs::remove_file(host).map_err(|e| map_io(e, host))
        }
    }

    fn read_dir(&self, dir: &PathRef) -> Result<Vec<PathRef>> {
        let host = host_path(dir)?;
        let entries = fs::read_dir(host).map_err(|e| map_io(e, host))?;
        entries
            .map(|entry| {
                entry
                    .map(|entry| local_path(entry.path()))
                    .map_err(|e| map_io(e, host))
            })
            .collect()
    }

    fn walk(&self, root: &PathRef, order: WalkOrder) -> Result<Vec<PathRef>> {
        let host = host_path(root)?;
        let mut walker = WalkDir::new(host).follow_links(true);
        if order == WalkOrder::Sorted {
            walker = walker.sort_by_file_name();
        }
        walker
            .into_iter()
            .map(|entry| {
                entry.map(|entry| local_path(entry.path())).map_err(|e| {
                    let path = e.path().unwrap_or(host).to_path_buf();
                    map_io(io::Error::from(e), &path)
                })
            })
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
