use std::any::Any;

use fxhash::FxHashSet;

use crate::error::Result;
use crate::vfs::{
    unwrap_path, AccessMode, Attributes, EntryTimes, Env, FileSystemProvider, FileSystemRef,
    Locator, PathRef, ProviderRef, WalkOrder, WriteMode,
};

/// Forwards every operation to a delegate provider, treating the access modes
/// in its allow-set as always granted.
///
/// Path arguments are unwrapped before they reach the delegate, so the
/// delegate only ever sees its own path type.
#[derive(Debug)]
pub struct OverrideProvider {
    delegate: ProviderRef,
    allowed_modes: FxHashSet<AccessMode>,
}

impl OverrideProvider {
    pub fn new(delegate: ProviderRef, allowed_modes: impl IntoIterator<Item = AccessMode>) -> Self {
        OverrideProvider {
            delegate,
            allowed_modes: allowed_modes.into_iter().collect(),
        }
    }

    pub fn delegate(&self) -> &ProviderRef {
        &self.delegate
    }

    /// The modes that still need checking by the delegate, or `None` when
    /// every requested mode is in the allow-set.
    ///
    /// An empty request is an existence check and is always forwarded.
    pub fn remaining_modes(&self, modes: &[AccessMode]) -> Option<Vec<AccessMode>> {
        if modes.is_empty() || self.allowed_modes.is_empty() {
            return Some(modes.to_vec());
        }
        let remaining: Vec<AccessMode> = modes
            .iter()
            .copied()
            .filter(|mode| !self.allowed_modes.contains(mode))
            .collect();
        if remaining.is_empty() {
            None
        } else {
            Some(remaining)
        }
    }
}

impl FileSystemProvider for OverrideProvider {
    fn scheme(&self) -> &str {
        self.delegate.scheme()
    }

    fn new_file_system(&self, path: &PathRef, env: &Env) -> Result<FileSystemRef> {
        self.delegate.new_file_system(&unwrap_path(path), env)
    }

    fn new_file_system_at(&self, locator: &Locator, env: &Env) -> Result<FileSystemRef> {
        self.delegate.new_file_system_at(locator, env)
    }

    fn check_access(&self, path: &PathRef, modes: &[AccessMode]) -> Result<()> {
        match self.remaining_modes(modes) {
            Some(remaining) => self.delegate.check_access(&unwrap_path(path), &remaining),
            None => {
                tracing::trace!("Access {:?} on {} granted by override", modes, path);
                Ok(())
            }
        }
    }

    fn read_attributes(&self, path: &PathRef) -> Result<Attributes> {
        self.delegate.read_attributes(&unwrap_path(path))
    }

    fn set_times(&self, path: &PathRef, times: EntryTimes) -> Result<()> {
        self.delegate.set_times(&unwrap_path(path), times)
    }

    fn create_directory(&self, dir: &PathRef) -> Result<()> {
        self.delegate.create_directory(&unwrap_path(dir))
    }

    fn read(&self, path: &PathRef) -> Result<Vec<u8>> {
        self.delegate.read(&unwrap_path(path))
    }

    fn write(&self, path: &PathRef, data: &[u8], mode: WriteMode) -> Result<()> {
        self.delegate.write(&unwrap_path(path), data, mode)
    }

    fn delete(&self, path: &PathRef) -> Result<()> {
        self.delegate.delete(&unwrap_path(path))
    }

    fn read_dir(&self, dir: &PathRef) -> Result<Vec<PathRef>> {
        self.delegate.read_dir(&unwrap_path(dir))
    }

    fn walk(&self, root: &PathRef, order: WalkOrder) -> Result<Vec<PathRef>> {
        self.delegate.walk(&unwrap_path(root), order)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
