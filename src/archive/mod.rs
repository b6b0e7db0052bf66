//! Opening, creating and copying zip archives through the vfs layer.
//!
//! Existing archives are opened with write-permission probes on the backing
//! file suppressed (see [`ignore_file_writability`]), so a mount is writable
//! whenever the archive provider would otherwise refuse a read-only backing
//! file. New archives are opened through a `jar:` locator and are written to
//! disk when the returned mount is closed.

pub mod reproducible;
pub mod zipfs;

pub use reproducible::ReproducibleFileSystem;
pub use zipfs::{ArchiveFileSystem, ArchivePath, ArchiveProvider, JAR_SCHEME};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{create_env, default_owner_env, load_options, merge_env};
use crate::delegate::ignore_file_writability;
use crate::error::{ArchiveError, Result, ResultExt};
use crate::vfs::{
    files, local_path, Env, FileSystemProvider, FileSystemRef, Locator, PathRef, WalkOrder,
    WriteMode,
};

/// The `jar:` locator naming the archive at `path`.
pub fn archive_locator(path: &Path) -> Result<Locator> {
    Locator::for_archive(JAR_SCHEME, path)
}

/// Open an existing archive.
pub fn open_archive(path: &PathRef) -> Result<FileSystemRef> {
    open_archive_with(path, &Env::default())
}

/// Open an existing archive with extra provider options. Keys in `env`
/// override the default owner and group.
pub fn open_archive_with(path: &PathRef, env: &Env) -> Result<FileSystemRef> {
    let env = merge_env(default_owner_env(), env);
    ArchiveProvider::installed()
        .new_file_system(&ignore_file_writability(path), &env)
        .with_context(|| format!("Failed to create a new filesystem for {}", path))
}

/// Open the archive named by a `jar:` locator.
///
/// Only one locator-opened mount per backing file may be live at a time.
pub fn open_locator(locator: &Locator, env: &Env) -> Result<FileSystemRef> {
    let env = merge_env(default_owner_env(), env);
    ArchiveProvider::installed()
        .new_file_system_at(locator, &env)
        .with_context(|| format!("Failed to create a new filesystem for {}", locator))
}

/// Create a new, empty archive at `path`.
///
/// Fails with `AlreadyExists` if anything exists at `path`. Missing parent
/// directories are created. The archive file itself appears on close.
pub fn create_archive(path: &Path) -> Result<FileSystemRef> {
    create_archive_with(path, &Env::default())
}

pub fn create_archive_with(path: &Path, env: &Env) -> Result<FileSystemRef> {
    let backing = local_path(path);
    if files::exists(&backing) {
        return Err(ArchiveError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = backing.parent() {
        if !parent.path().as_os_str().is_empty() {
            files::create_directories(&parent)
                .with_context(|| format!("Could not create parent directories of {}", path.display()))?;
        }
    }

    let locator = archive_locator(path)?;
    tracing::debug!("Creating archive {}", locator);
    open_locator(&locator, &merge_env(create_env(), env))
}

/// Open the archive at `path`, creating it if it does not exist.
pub fn new_zip(path: &Path) -> Result<FileSystemRef> {
    new_zip_with(path, &Env::default())
}

pub fn new_zip_with(path: &Path, env: &Env) -> Result<FileSystemRef> {
    let backing = local_path(path);
    if files::exists(&backing) {
        open_archive_with(&backing, env)
    } else {
        create_archive_with(path, env)
    }
}

/// Like [`new_zip_with`], with options read from the TOML file at
/// `options_file`.
pub fn new_zip_configured(path: &Path, options_file: &Path) -> Result<FileSystemRef> {
    let options = load_options(options_file)?;
    tracing::debug!(
        "Loaded archive options for {} from {}",
        path.display(),
        options_file.display()
    );
    new_zip_with(path, &options.to_env())
}

/// Add `source` to the archive at `archive`, creating the archive if needed.
///
/// A directory source contributes its contents, not itself: each child lands
/// at the archive root. A file source lands at the root under its own name.
/// Symbolic links in the source are followed.
pub fn zip_tree(source: &PathRef, archive: &Path) -> Result<()> {
    let fs = new_zip(archive)?;
    let copied = copy_into_archive(source, &fs, WalkOrder::Natural);
    close_after(fs, copied)
}

/// Extract every member of `archive` below `target`, creating `target` if
/// needed.
pub fn unzip(archive: &PathRef, target: &PathRef) -> Result<()> {
    ensure_target_directory(target).with_context(|| {
        format!("Could not unzip {} to target dir {}", archive, target)
    })?;
    let fs = open_archive(archive)?;
    let copied = copy_from_archive(&fs, target)
        .with_context(|| format!("Could not unzip {} to target dir {}", archive, target));
    close_after(fs, copied)
}

/// Copy every root tree of a mounted archive below `target`.
///
/// Directories that already exist are reused; files are overwritten.
pub fn copy_from_archive(fs: &FileSystemRef, target: &PathRef) -> Result<()> {
    for root in Arc::clone(fs).root_directories() {
        copy_tree(&root, target, WalkOrder::Natural)?;
    }
    Ok(())
}

/// Create a new archive whose members all carry `time` once it is closed.
///
/// Fails with `AlreadyExists` if anything exists at `path`. With no `time`
/// the archive is created normally.
pub fn create_reproducible(
    path: &Path,
    env: &Env,
    time: Option<DateTime<Utc>>,
) -> Result<FileSystemRef> {
    let fs = create_archive_with(path, env)?;
    Ok(Arc::new(ReproducibleFileSystem::new(fs, time)))
}

/// Build a new archive from `source` that is byte-identical across runs for
/// identical input.
///
/// Members are added in name order and stamped with `time`.
pub fn zip_reproducibly(source: &PathRef, archive: &Path, time: DateTime<Utc>) -> Result<()> {
    let fs = create_reproducible(archive, &Env::default(), Some(time))?;
    let copied = copy_into_archive(source, &fs, WalkOrder::Sorted);
    close_after(fs, copied)
}

fn copy_into_archive(source: &PathRef, fs: &FileSystemRef, order: WalkOrder) -> Result<()> {
    let root = Arc::clone(fs).path("/");
    if files::is_directory(source) {
        return copy_tree(source, &root, order);
    }
    let name = source
        .file_name()
        .ok_or_else(|| ArchiveError::NotFound(source.to_string()))?;
    let target = root.resolve(&name);
    files::copy(source, &target, WriteMode::Replace)
        .with_context(|| format!("Could not copy {} to {}", source, target))
}

/// Copy `source` and everything beneath it so that `source` itself maps to
/// `target`.
fn copy_tree(source: &PathRef, target: &PathRef, order: WalkOrder) -> Result<()> {
    for path in files::walk(source, order)? {
        let relative = files::relativize(source, &path)?;
        let destination = if relative.is_empty() {
            Arc::clone(target)
        } else {
            target.resolve(&relative)
        };
        copy_entry(&path, &destination)
            .with_context(|| format!("Could not copy {} to {}", path, destination))?;
    }
    Ok(())
}

fn copy_entry(source: &PathRef, target: &PathRef) -> Result<()> {
    if files::is_directory(source) {
        return match files::create_directory(target) {
            Err(e) if e.is_already_exists() && files::is_directory(target) => Ok(()),
            other => other,
        };
    }
    files::copy(source, target, WriteMode::Replace)
}

fn ensure_target_directory(target: &PathRef) -> Result<()> {
    if files::exists(target) && !files::is_directory(target) {
        return Err(ArchiveError::NotADirectory(format!(
            "Could not create directory '{}' as a file already exists with the same name",
            target
        )));
    }
    files::create_directories(target)
}

/// Close `fs` whatever happened before, reporting the earlier error first.
fn close_after(fs: FileSystemRef, result: Result<()>) -> Result<()> {
    let closed = fs.close();
    match (result, closed) {
        (Err(e), Err(close_err)) => {
            tracing::warn!("Failed to close {:?}: {}", fs, close_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => closed,
    }
}
