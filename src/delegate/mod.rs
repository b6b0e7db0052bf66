//! Proxies that swap out individual behaviours of a mounted file system.
//!
//! The three wrappers mirror the three vfs traits:
//!
//! - [`OverrideProvider`] filters access checks through an allow-set and
//!   forwards everything else.
//! - [`OverrideFileSystem`] reports a substitute provider.
//! - [`OverridePath`] reports a substitute file system.
//!
//! Wrapping a path with all three makes every provider-dispatched operation
//! on it pass through the override, while the delegate provider still
//! receives its own, unwrapped path type.

mod file_system;
mod path;
mod provider;

pub use file_system::OverrideFileSystem;
pub use path::OverridePath;
pub use provider::OverrideProvider;

use std::sync::Arc;

use crate::vfs::{AccessMode, FileSystemRef, PathRef, ProviderRef};

/// Wrap `path` so that checks for the given access modes always succeed.
pub fn with_allowed_access(
    path: &PathRef,
    allowed_modes: impl IntoIterator<Item = AccessMode>,
) -> PathRef {
    let fs = path.file_system();
    let provider: ProviderRef = Arc::new(OverrideProvider::new(fs.provider(), allowed_modes));
    let fs: FileSystemRef = Arc::new(OverrideFileSystem::new(fs, provider));
    Arc::new(OverridePath::new(Arc::clone(path), fs))
}

/// Wrap `path` so that write-permission probes on it always succeed.
///
/// Some archive providers insist on a writable backing file even for a
/// read-only mount; this lets such a mount open a read-only file while read
/// checks still reach the real provider.
pub fn ignore_file_writability(path: &PathRef) -> PathRef {
    with_allowed_access(path, [AccessMode::Write])
}
