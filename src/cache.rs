use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;
use tracing::debug;

use crate::error::Result;

/// Identity of a source file at the time it was read. A cached table is served only while
/// the file on disk still has the same stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl SourceStamp {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub loads: usize,
}

struct CachedTable {
    stamp: SourceStamp,
    frame: DataFrame,
}

/// Memoized table reads, shared by every page for the lifetime of the process.
///
/// Readers get a clone of the cached `DataFrame`. Columns are reference counted, so the clone
/// is cheap, and mutating it never touches the cached copy.
#[derive(Default)]
pub struct TableCache {
    entries: RwLock<HashMap<String, CachedTable>>,
    hits: AtomicUsize,
    loads: AtomicUsize,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached frame for `key` if it was read from a file with the same stamp,
    /// otherwise run `load` and cache its result.
    ///
    /// Concurrent first access may run `load` more than once; the last writer wins, which is
    /// harmless because loads are deterministic.
    pub fn get_or_load<F>(&self, key: &str, stamp: SourceStamp, load: F) -> Result<DataFrame>
    where
        F: FnOnce(&Path) -> Result<DataFrame>,
    {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = entries.get(key) {
                if cached.stamp == stamp {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(table = key, "cache hit");
                    return Ok(cached.frame.clone());
                }
                debug!(table = key, "source changed on disk, reloading");
            }
        }

        let frame = load(&stamp.path)?;
        self.loads.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            CachedTable {
                stamp,
                frame: frame.clone(),
            },
        );
        Ok(frame)
    }

    /// Drop a single cached table
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Drop every cached table
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}
