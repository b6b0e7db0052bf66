//! Path-level helpers that dispatch through the owning provider.
//!
//! Every helper resolves the provider via `path.file_system().provider()`, so
//! a path wrapped in an override file system is served by the override
//! provider rather than the native one.

use std::sync::Arc;

use super::{Attributes, EntryTimes, FileSystemProvider, PathRef, WalkOrder, WriteMode};
use crate::error::{ArchiveError, Result};

pub fn provider_of(path: &PathRef) -> Arc<dyn FileSystemProvider> {
    path.file_system().provider()
}

pub fn exists(path: &PathRef) -> bool {
    provider_of(path).check_access(path, &[]).is_ok()
}

pub fn is_directory(path: &PathRef) -> bool {
    read_attributes(path)
        .map(|attrs| attrs.is_dir())
        .unwrap_or(false)
}

pub fn read_attributes(path: &PathRef) -> Result<Attributes> {
    provider_of(path).read_attributes(path)
}

pub fn set_times(path: &PathRef, times: EntryTimes) -> Result<()> {
    provider_of(path).set_times(path, times)
}

pub fn read(path: &PathRef) -> Result<Vec<u8>> {
    provider_of(path).read(path)
}

/// Write `data` to `path`, replacing any existing file.
pub fn write(path: &PathRef, data: impl AsRef<[u8]>) -> Result<()> {
    provider_of(path).write(path, data.as_ref(), WriteMode::Replace)
}

pub fn create_directory(path: &PathRef) -> Result<()> {
    provider_of(path).create_directory(path)
}

/// Create `path` and any missing parents. Existing directories are fine; an
/// existing non-directory anywhere along the way is `AlreadyExists`.
pub fn create_directories(path: &PathRef) -> Result<()> {
    if is_directory(path) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.path().as_os_str().is_empty() {
            create_directories(&parent)?;
        }
    }
    match create_directory(path) {
        Err(e) if e.is_already_exists() && is_directory(path) => Ok(()),
        other => other,
    }
}

/// Copy one entry between any two providers. A directory source creates an
/// empty directory at `target`; its contents are not copied.
pub fn copy(source: &PathRef, target: &PathRef, mode: WriteMode) -> Result<()> {
    if read_attributes(source)?.is_dir() {
        if mode == WriteMode::Replace && is_directory(target) {
            return Ok(());
        }
        return create_directory(target);
    }
    let data = read(source)?;
    provider_of(target).write(target, &data, mode)
}

pub fn walk(root: &PathRef, order: WalkOrder) -> Result<Vec<PathRef>> {
    provider_of(root).walk(root, order)
}

/// `path` relative to `base`, `/`-separated. Empty when they are the same.
pub fn relativize(base: &PathRef, path: &PathRef) -> Result<String> {
    let relative = path.path().strip_prefix(base.path()).map_err(|_| {
        ArchiveError::NotFound(format!("{} is not beneath {}", path, base))
    })?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
