use std::any::Any;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::{Result, ResultExt};
use crate::vfs::{files, EntryTimes, FileSystem, FileSystemRef, PathRef, ProviderRef, WalkOrder};

/// A writable archive mount whose close first stamps every member with one
/// fixed instant.
///
/// Only the final state matters: members added, replaced or touched at any
/// point before `close` all end up with the same created, modified and
/// accessed times. The root of each tree is left alone. Without an instant
/// this behaves exactly like the wrapped mount.
#[derive(Debug)]
pub struct ReproducibleFileSystem {
    delegate: FileSystemRef,
    time: Option<SystemTime>,
}

impl ReproducibleFileSystem {
    pub fn new(delegate: FileSystemRef, time: Option<DateTime<Utc>>) -> Self {
        ReproducibleFileSystem {
            delegate,
            time: time.map(SystemTime::from),
        }
    }

    pub fn delegate(&self) -> &FileSystemRef {
        &self.delegate
    }

    pub fn fixed_time(&self) -> Option<SystemTime> {
        self.time
    }

    fn normalize_times(&self, time: SystemTime) -> Result<()> {
        let times = EntryTimes::all(time);
        for root in Arc::clone(&self.delegate).root_directories() {
            for path in files::walk(&root, WalkOrder::Sorted)?.iter().skip(1) {
                files::set_times(path, times)
                    .with_context(|| format!("Could not set time attributes on {}", path))?;
            }
        }
        Ok(())
    }
}

impl FileSystem for ReproducibleFileSystem {
    fn provider(&self) -> ProviderRef {
        self.delegate.provider()
    }

    fn close(&self) -> Result<()> {
        if !self.delegate.is_open() {
            return Ok(());
        }
        let normalized = match self.time {
            Some(time) => self.normalize_times(time),
            None => Ok(()),
        };
        // The underlying mount is closed even when normalization failed.
        let closed = self.delegate.close();
        match (normalized, closed) {
            (Err(e), Err(close_err)) => {
                tracing::warn!(
                    "Failed to close {:?} after timestamp normalization failed: {}",
                    self.delegate,
                    close_err
                );
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), closed) => closed,
        }
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
