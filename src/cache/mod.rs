//! Shared archive mounts keyed by backing file.
//!
//! The cache opens each backing file at most once and hands every caller the
//! same [`CacheableFileSystem`]. Closing a handed-out mount is a no-op; the
//! real mounts are closed together by [`FileSystemCache::close`].

mod cacheable;

pub use cacheable::CacheableFileSystem;

use std::sync::Arc;

use dashmap::DashMap;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::vfs::{unwrap_path, Env, PathRef, ProviderRef};

#[derive(Debug, Default)]
pub struct FileSystemCache {
    mounts: RwLock<FxHashMap<String, Arc<CacheableFileSystem>>>,
    /// Per-key locks serializing the first open of each backing file.
    /// Entries are never removed, so this grows with the number of distinct
    /// backing files seen.
    open_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileSystemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached mount of `backing`, opening it through `provider` on first
    /// use.
    ///
    /// Concurrent first calls for the same backing file open it once; the
    /// others wait and receive the same mount. A failed open is not cached.
    pub fn get_or_create(
        &self,
        provider: &ProviderRef,
        backing: &PathRef,
        env: &Env,
    ) -> Result<Arc<CacheableFileSystem>> {
        let key = unwrap_path(backing).to_string();
        if let Some(fs) = self.mounts.read().get(&key) {
            return Ok(Arc::clone(fs));
        }

        let lock = self.open_lock(&key);
        let _guard = lock.lock();

        if let Some(fs) = self.mounts.read().get(&key) {
            return Ok(Arc::clone(fs));
        }

        tracing::debug!("Cache miss for {}, opening", key);
        let fs = Arc::new(CacheableFileSystem::new(
            provider.new_file_system(backing, env)?,
        ));
        self.mounts.write().insert(key, Arc::clone(&fs));
        Ok(fs)
    }

    /// Close every cached mount and empty the cache.
    ///
    /// Every mount is closed even if some fail; the first failure is
    /// returned. Mounts previously handed out must no longer be in use. The
    /// cache can be used again afterwards.
    pub fn close(&self) -> Result<()> {
        let mut mounts = self.mounts.write();
        let mut first_error = None;
        for (key, fs) in mounts.drain() {
            if let Err(e) = fs.delegate().close() {
                tracing::warn!("Failed to close cached file system {}: {}", key, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.mounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.read().is_empty()
    }

    /// Number of per-key open locks held.
    pub fn open_lock_count(&self) -> usize {
        self.open_locks.len()
    }

    /// The shard guard is released before the returned lock is taken.
    fn open_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let entry = self
            .open_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(&*entry)
    }
}
