use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use archive_vfs::error::{ArchiveError, Result};
use archive_vfs::vfs::{
    default_file_system, local_path, unwrap_path, Attributes, EntryTimes, LocalProvider,
    WriteMode,
};
use archive_vfs::{
    AccessMode, ArchiveProvider, Env, FileSystemProvider, FileSystemRef, Locator,
    OverrideFileSystem, OverridePath, PathRef, ProviderRef, WalkOrder,
};
use walkdir::WalkDir;

static TRACING: Once = Once::new();

/// Install a test subscriber. Set `ARCHIVE_VFS_LOG=debug` to see output.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_env("ARCHIVE_VFS_LOG"))
            .with_test_writer()
            .try_init();
    });
}

/// Create files (and their parent directories) under `root`. A path ending
/// in `/` creates an empty directory.
#[allow(dead_code)]
pub fn write_tree(root: &Path, entries: &[(&str, &[u8])]) {
    for (path, content) in entries {
        let target = root.join(path);
        if path.ends_with('/') {
            fs::create_dir_all(&target).expect("Failed to create directory");
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&target, content).expect("Failed to write file");
    }
}

/// Relative path of every entry below `root`, mapped to its contents
/// (`None` for directories).
#[allow(dead_code)]
pub fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.expect("Failed to walk tree");
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            let content = if entry.file_type().is_dir() {
                None
            } else {
                Some(fs::read(entry.path()).expect("Failed to read file"))
            };
            (relative, content)
        })
        .collect()
}

/// Member paths of a mounted archive in walk order, excluding the root.
#[allow(dead_code)]
pub fn member_names(fs: &FileSystemRef, order: WalkOrder) -> Vec<String> {
    let root = Arc::clone(fs).path("/");
    archive_vfs::vfs::files::walk(&root, order)
        .unwrap()
        .iter()
        .skip(1)
        .map(|p| p.to_string())
        .collect()
}

/// A host-file provider that reports every file as not writable, while
/// still performing writes. Models providers whose permission probe is
/// stricter than the file system itself.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct WriteDenyingProvider;

impl FileSystemProvider for WriteDenyingProvider {
    fn scheme(&self) -> &str {
        "file"
    }

    fn new_file_system(&self, path: &PathRef, env: &Env) -> Result<FileSystemRef> {
        LocalProvider.new_file_system(&unwrap_path(path), env)
    }

    fn check_access(&self, path: &PathRef, modes: &[AccessMode]) -> Result<()> {
        if modes.contains(&AccessMode::Write) {
            return Err(ArchiveError::PermissionDenied {
                path: path.to_string(),
                modes: modes.to_vec(),
            });
        }
        LocalProvider.check_access(&unwrap_path(path), modes)
    }

    fn read_attributes(&self, path: &PathRef) -> Result<Attributes> {
        LocalProvider.read_attributes(&unwrap_path(path))
    }

    fn set_times(&self, path: &PathRef, times: EntryTimes) -> Result<()> {
        LocalProvider.set_times(&unwrap_path(path), times)
    }

    fn create_directory(&self, dir: &PathRef) -> Result<()> {
        LocalProvider.create_directory(&unwrap_path(dir))
    }

    fn read(&self, path: &PathRef) -> Result<Vec<u8>> {
        LocalProvider.read(&unwrap_path(path))
    }

    fn write(&self, path: &PathRef, data: &[u8], mode: WriteMode) -> Result<()> {
        LocalProvider.write(&unwrap_path(path), data, mode)
    }

    fn delete(&self, path: &PathRef) -> Result<()> {
        LocalProvider.delete(&unwrap_path(path))
    }

    fn read_dir(&self, dir: &PathRef) -> Result<Vec<PathRef>> {
        LocalProvider.read_dir(&unwrap_path(dir))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `path` on the host, served by [`WriteDenyingProvider`].
#[allow(dead_code)]
pub fn write_denied_path(path: &Path) -> PathRef {
    let provider: ProviderRef = Arc::new(WriteDenyingProvider);
    let fs: FileSystemRef = Arc::new(OverrideFileSystem::new(default_file_system(), provider));
    Arc::new(OverridePath::new(local_path(path), fs))
}

/// Archive provider that counts mounts and holds each one open for a while,
/// widening the window for racing callers.
#[allow(dead_code)]
#[derive(Debug)]
pub struct CountingProvider {
    inner: ArchiveProvider,
    delay: Duration,
    pub opens: AtomicUsize,
}

#[allow(dead_code)]
impl CountingProvider {
    pub fn new(delay: Duration) -> Self {
        CountingProvider {
            inner: ArchiveProvider::new(),
            delay,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl FileSystemProvider for CountingProvider {
    fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    fn new_file_system(&self, path: &PathRef, env: &Env) -> Result<FileSystemRef> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.new_file_system(path, env)
    }

    fn new_file_system_at(&self, locator: &Locator, env: &Env) -> Result<FileSystemRef> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.new_file_system_at(locator, env)
    }

    fn check_access(&self, path: &PathRef, modes: &[AccessMode]) -> Result<()> {
        self.inner.check_access(path, modes)
    }

    fn read_attributes(&self, path: &PathRef) -> Result<Attributes> {
        self.inner.read_attributes(path)
    }

    fn set_times(&self, path: &PathRef, times: EntryTimes) -> Result<()> {
        self.inner.set_times(path, times)
    }

    fn create_directory(&self, dir: &PathRef) -> Result<()> {
        self.inner.create_directory(dir)
    }

    fn read(&self, path: &PathRef) -> Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &PathRef, data: &[u8], mode: WriteMode) -> Result<()> {
        self.inner.write(path, data, mode)
    }

    fn delete(&self, path: &PathRef) -> Result<()> {
        self.inner.delete(path)
    }

    fn read_dir(&self, dir: &PathRef) -> Result<Vec<PathRef>> {
        self.inner.read_dir(dir)
    }

    fn walk(&self, root: &PathRef, order: WalkOrder) -> Result<Vec<PathRef>> {
        self.inner.walk(root, order)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
