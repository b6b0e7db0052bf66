//! Capability traits for mounted virtual file systems.
//!
//! A mount is modelled as three cooperating objects:
//!
//! ```text
//! FileSystemProvider  (one per scheme, performs every operation)
//! └── FileSystem      (a live mount, hands out paths)
//!     └── VirtualPath (an entry inside exactly one mount)
//! ```
//!
//! Operations on a path are dispatched through
//! `path.file_system().provider()`, so a proxy file system that substitutes
//! its provider changes how every operation on its paths behaves. Providers
//! downcast the paths they receive to their own concrete type and reject
//! anything else, which is why proxy paths must be unwrapped (see
//! [`unwrap_path`]) before they cross into a delegate provider.

pub mod files;
pub mod local;
pub mod locator;
pub mod types;

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use crate::error::{ArchiveError, Result};

pub use local::{default_file_system, local_path, LocalFileSystem, LocalPath, LocalProvider};
pub use locator::Locator;
pub use types::{AccessMode, Attributes, EntryTimes, Env, FileKind, WalkOrder, WriteMode};

pub type PathRef = Arc<dyn VirtualPath>;
pub type FileSystemRef = Arc<dyn FileSystem>;
pub type ProviderRef = Arc<dyn FileSystemProvider>;

/// An entry inside a mounted file system.
///
/// `Display` yields the string form of the path.
pub trait VirtualPath: Any + Send + Sync + fmt::Debug + fmt::Display {
    /// The mount this path belongs to.
    fn file_system(&self) -> FileSystemRef;

    /// Textual form of the path within its mount.
    fn path(&self) -> &Path;

    /// Resolve `other` against this path. Absolute `other` replaces it.
    fn resolve(&self, other: &str) -> PathRef;

    fn parent(&self) -> Option<PathRef>;

    fn file_name(&self) -> Option<String> {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// The path this one forwards to, if it is a proxy.
    fn wrapped(&self) -> Option<&PathRef> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A live mount.
pub trait FileSystem: Any + Send + Sync + fmt::Debug {
    /// The provider that performs operations on this mount's paths.
    fn provider(&self) -> ProviderRef;

    /// Release the mount. Writable archive mounts are finalized on disk here.
    fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn is_read_only(&self) -> bool;

    fn separator(&self) -> &str {
        "/"
    }

    fn root_directories(self: Arc<Self>) -> Vec<PathRef>;

    /// A path on this mount. Relative paths are taken relative to the root.
    fn path(self: Arc<Self>, path: &str) -> PathRef;

    /// The file system this one forwards to, if it is a proxy.
    fn wrapped(&self) -> Option<&FileSystemRef> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Performs every operation on the paths of the mounts it owns.
///
/// Implementations must report "already exists" as
/// [`ArchiveError::AlreadyExists`] so callers can tell it apart from generic
/// I/O failures.
pub trait FileSystemProvider: Any + Send + Sync + fmt::Debug {
    fn scheme(&self) -> &str;

    /// Mount the file at `path` as a new file system.
    fn new_file_system(&self, path: &PathRef, env: &Env) -> Result<FileSystemRef>;

    /// Mount the resource named by `locator` as a new file system.
    fn new_file_system_at(&self, locator: &Locator, env: &Env) -> Result<FileSystemRef> {
        let _ = (locator, env);
        Err(ArchiveError::Unsupported {
            op: "new_file_system_at",
            scheme: self.scheme().to_string(),
        })
    }

    /// Check that `path` exists and permits every mode in `modes`.
    /// An empty `modes` slice only checks existence.
    fn check_access(&self, path: &PathRef, modes: &[AccessMode]) -> Result<()>;

    fn read_attributes(&self, path: &PathRef) -> Result<Attributes>;

    fn set_times(&self, path: &PathRef, times: EntryTimes) -> Result<()>;

    fn create_directory(&self, dir: &PathRef) -> Result<()>;

    fn read(&self, path: &PathRef) -> Result<Vec<u8>>;

    fn write(&self, path: &PathRef, data: &[u8], mode: WriteMode) -> Result<()>;

    fn delete(&self, path: &PathRef) -> Result<()>;

    fn read_dir(&self, dir: &PathRef) -> Result<Vec<PathRef>>;

    /// Every path beneath `root`, `root` first, each directory before its
    /// children. Symbolic links are followed.
    fn walk(&self, root: &PathRef, order: WalkOrder) -> Result<Vec<PathRef>> {
        let mut out = Vec::new();
        let mut stack = vec![Arc::clone(root)];
        while let Some(path) = stack.pop() {
            let is_dir = self.read_attributes(&path)?.is_dir();
            out.push(Arc::clone(&path));
            if is_dir {
                let mut children = self.read_dir(&path)?;
                if order == WalkOrder::Sorted {
                    children.sort_by(|a, b| a.path().cmp(b.path()));
                }
                stack.extend(children.into_iter().rev());
            }
        }
        Ok(out)
    }

    fn as_any(&self) -> &dyn Any;
}

/// Strip one layer of proxying from `path`.
///
/// A delegate provider only understands its own path type, so every path
/// argument crossing from a proxy into its delegate goes through here.
pub fn unwrap_path(path: &PathRef) -> PathRef {
    match path.wrapped() {
        Some(inner) => Arc::clone(inner),
        None => Arc::clone(path),
    }
}

/// Strip one layer of proxying from `fs`.
pub fn unwrap_file_system(fs: &FileSystemRef) -> FileSystemRef {
    match fs.wrapped() {
        Some(inner) => Arc::clone(inner),
        None => Arc::clone(fs),
    }
}

fn innermost_path(path: &dyn VirtualPath) -> &dyn VirtualPath {
    let mut current = path;
    while let Some(inner) = current.wrapped() {
        current = inner.as_ref();
    }
    current
}

fn innermost_file_system(fs: &dyn FileSystem) -> &dyn FileSystem {
    let mut current = fs;
    while let Some(inner) = current.wrapped() {
        current = inner.as_ref();
    }
    current
}

/// Proxies compare equal to the file system they wrap.
impl PartialEq for dyn FileSystem {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(innermost_file_system(self), innermost_file_system(other))
    }
}

impl Eq for dyn FileSystem {}

/// Proxies compare equal to, and hash like, the path they wrap.
impl PartialEq for dyn VirtualPath {
    fn eq(&self, other: &Self) -> bool {
        let a = innermost_path(self);
        let b = innermost_path(other);
        a.path() == b.path() && *a.file_system() == *b.file_system()
    }
}

impl Eq for dyn VirtualPath {}

impl Hash for dyn VirtualPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        innermost_path(self).path().hash(state);
    }
}
