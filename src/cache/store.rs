//! Cache store abstraction
//!
//! The store owns cache entries entirely. Callers address entries by key and
//! never look inside them.

use crate::cache::key::CacheKey;
use crate::error::VenvResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Metadata kept alongside a stored entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    /// Full cache key
    pub key: String,
    /// Digest used as the on-disk entry name
    pub digest: String,
    /// When the entry was saved
    pub created_at: DateTime<Utc>,
    /// Total size of regular files in the entry
    pub size_bytes: u64,
}

impl CacheEntryInfo {
    /// Create metadata for an entry saved now
    pub fn new(key: &CacheKey, size_bytes: u64) -> Self {
        Self {
            key: key.to_string(),
            digest: key.digest(),
            created_at: Utc::now(),
            size_bytes,
        }
    }

    /// The entry's key
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_raw(self.key.clone())
    }

    /// Check if this entry is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.created_at < cutoff
    }
}

/// Key-value blob store for virtual environments
///
/// Restore happens before the job uses the environment, save after the job
/// is done with it. Saving the same key twice is allowed; the last writer wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore the entry for `key` into `target`. Returns false on a miss,
    /// in which case `target` is left untouched. A failed restore also leaves
    /// `target` as it was.
    async fn restore(&self, key: &CacheKey, target: &Path) -> VenvResult<bool>;

    /// Store the directory tree at `source` under `key`
    async fn save(&self, key: &CacheKey, source: &Path) -> VenvResult<CacheEntryInfo>;

    /// List all entries
    async fn list(&self) -> VenvResult<Vec<CacheEntryInfo>>;

    /// Remove the entry for `key`. Returns false if there was none.
    async fn remove(&self, key: &CacheKey) -> VenvResult<bool>;

    /// Delete leftovers of interrupted or superseded saves that are at least
    /// `min_age` old. Returns how many were removed.
    async fn prune_incomplete(&self, min_age: Duration) -> VenvResult<usize>;

    /// Human-readable store name for display
    fn store_name(&self) -> &'static str;
}
