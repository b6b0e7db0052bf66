use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::vfs::{FileSystemRef, PathRef, VirtualPath};

/// A path that forwards to a delegate but reports a different owning file
/// system. Paths derived from it (`resolve`, `parent`) are plain delegate
/// paths.
pub struct OverridePath {
    delegate: PathRef,
    fs: FileSystemRef,
}

impl OverridePath {
    pub fn new(delegate: PathRef, fs: FileSystemRef) -> Self {
        OverridePath { delegate, fs }
    }

    pub fn delegate(&self) -> &PathRef {
        &self.delegate
    }
}

impl fmt::Debug for OverridePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OverridePath").field(&self.delegate).finish()
    }
}

impl fmt::Display for OverridePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.delegate, f)
    }
}

impl VirtualPath for OverridePath {
    fn file_system(&self) -> FileSystemRef {
        Arc::clone(&self.fs)
    }

    fn path(&self) -> &Path {
        self.delegate.path()
    }

    fn resolve(&self, other: &str) -> PathRef {
        self.delegate.resolve(other)
    }

    fn parent(&self) -> Option<PathRef> {
        self.delegate.parent()
    }

    fn file_name(&self) -> Option<String> {
        self.delegate.file_name()
    }

    fn wrapped(&self) -> Option<&PathRef> {
        Some(&self.delegate)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
