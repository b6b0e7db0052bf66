use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::vfs::{FileSystem, FileSystemRef, PathRef, ProviderRef};

/// A cached mount whose `close` does nothing.
///
/// Callers may close what the cache hands them as if they owned it; the real
/// mount stays open until [`super::FileSystemCache::close`].
#[derive(Debug)]
pub struct CacheableFileSystem {
    delegate: FileSystemRef,
}

impl CacheableFileSystem {
    pub fn new(delegate: FileSystemRef) -> Self {
        CacheableFileSystem { delegate }
    }

    /// The real mount. Closing it bypasses the cache.
    pub fn delegate(&self) -> &FileSystemRef {
        &self.delegate
    }
}

impl FileSystem for CacheableFileSystem {
    fn provider(&self) -> ProviderRef {
        self.delegate.provider()
    }

    fn close(&self) -> Result<()> {
        tracing::trace!("Ignoring close of cached {:?}", self.delegate);
        Ok(())
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
