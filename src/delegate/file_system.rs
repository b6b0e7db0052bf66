use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::vfs::{FileSystem, FileSystemRef, PathRef, ProviderRef};

/// A file system that forwards to a delegate but reports a different
/// provider, so operations dispatched through `provider()` reach the
/// substitute.
#[derive(Debug)]
pub struct OverrideFileSystem {
    delegate: FileSystemRef,
    provider: ProviderRef,
}

impl OverrideFileSystem {
    pub fn new(delegate: FileSystemRef, provider: ProviderRef) -> Self {
        OverrideFileSystem { delegate, provider }
    }

    pub fn delegate(&self) -> &FileSystemRef {
        &self.delegate
    }
}

impl FileSystem for OverrideFileSystem {
    fn provider(&self) -> ProviderRef {
        Arc::clone(&self.provider)
    }

    fn close(&self) -> Result<()> {
        self.delegate.close()
    }

    fn is_open(&self) -> bool {
        self.delegate.is_open()
    }

    fn is_read_only(&self) -> bool {
        self.delegate.is_read_only()
    }

    fn separator(&self) -> &str {
        self.delegate.separator()
    }

    fn root_directories(self: Arc<Self>) -> Vec<PathRef> {
        Arc::clone(&self.delegate).root_directories()
    }

    fn path(self: Arc<Self>, path: &str) -> PathRef {
        Arc::clone(&self.delegate).path(path)
    }

    fn wrapped(&self) -> Option<&FileSystemRef> {
        Some(&self.delegate)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
