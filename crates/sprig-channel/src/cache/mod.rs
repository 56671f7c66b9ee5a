//! On-disk channel cache
//!
//! One JSON file per (channel URL, subdir), named by a blake3 digest of the
//! pair. Entries are read back into an in-memory map so a channel is only
//! read from disk once per process. A missing or unreadable file is a cache
//! miss, never an error. File I/O goes through `tokio::fs`; the atomic
//! replace runs on the blocking pool.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sprig_core::error::SprigError;
use sprig_core::utils::cache_key;
use sprig_core::PackageRecord;
use tracing::{debug, warn};

use crate::ChannelResult;

/// When and how a cache entry was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Freshness {
    /// Time of the fetch that produced the entry
    pub fetched_at: DateTime<Utc>,
    /// Entity tag of the fetched document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Freshness {
    /// Freshness token for a fetch happening now
    pub fn now(etag: Option<String>) -> Self {
        Self {
            fetched_at: Utc::now(),
            etag,
        }
    }
}

/// Cached records of one channel subdirectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Channel URL
    pub channel: String,
    /// Platform subdirectory
    pub subdir: String,
    /// Freshness token
    pub freshness: Freshness,
    /// Records as they were fetched
    pub records: Vec<PackageRecord>,
}

impl CacheEntry {
    /// Create a cache entry stamped with the current time
    pub fn new(channel: &str, subdir: &str, records: Vec<PackageRecord>, etag: Option<String>) -> Self {
        Self {
            channel: channel.trim_end_matches('/').to_string(),
            subdir: subdir.to_string(),
            freshness: Freshness::now(etag),
            records,
        }
    }
}

/// Disk-backed channel cache
#[derive(Debug)]
pub struct ChannelCache {
    /// Directory holding one file per entry
    dir: Utf8PathBuf,
    /// Entries already read or written by this process
    memory: DashMap<String, Arc<CacheEntry>>,
}

/// Summary of the cache directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entry files
    pub total_entries: usize,
    /// Records across all readable entries
    pub total_records: usize,
    /// Files that could not be read as entries
    pub corrupt_entries: usize,
    /// Fetch time of the oldest readable entry
    pub oldest_fetch: Option<DateTime<Utc>>,
}

impl ChannelCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            memory: DashMap::new(),
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// File backing the entry for a channel subdirectory
    pub fn path_for(&self, channel: &str, subdir: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}.json", cache_key(channel, subdir)))
    }

    /// Load the entry for a channel subdirectory, if present and readable
    pub async fn load(&self, channel: &str, subdir: &str) -> Option<Arc<CacheEntry>> {
        let key = cache_key(channel, subdir);
        if let Some(entry) = self.memory.get(&key).map(|entry| entry.clone()) {
            return Some(entry);
        }

        let path = self.path_for(channel, subdir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache entry for {}/{}", channel, subdir);
                return None;
            },
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path, e);
                return None;
            },
        };

        let entry = match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt cache file {}: {}", path, e);
                return None;
            },
        };

        let entry = Arc::new(entry);
        self.memory.insert(key, entry.clone());
        Some(entry)
    }

    /// Write an entry, replacing any previous one atomically
    pub async fn store(&self, entry: CacheEntry) -> ChannelResult<Arc<CacheEntry>> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SprigError::io(format!("Failed to create cache directory {}", self.dir), e))?;

        let path = self.path_for(&entry.channel, &entry.subdir);
        let content = serde_json::to_vec(&entry).map_err(|e| SprigError::Json {
            message: format!("Failed to serialize cache entry: {}", e),
        })?;

        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &content))
            .await
            .map_err(|e| SprigError::io(format!("Cache writer for {} failed", path), std::io::Error::other(e)))??;

        debug!("Cached {} records for {}/{}", entry.records.len(), entry.channel, entry.subdir);

        let entry = Arc::new(entry);
        self.memory.insert(cache_key(&entry.channel, &entry.subdir), entry.clone());
        Ok(entry)
    }

    /// Scan the cache directory
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return stats;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            stats.total_entries += 1;
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .ok()
                .and_then(|content| serde_json::from_str::<CacheEntry>(&content).ok());
            match parsed {
                Some(cached) => {
                    stats.total_records += cached.records.len();
                    let fetched_at = cached.freshness.fetched_at;
                    stats.oldest_fetch = Some(stats.oldest_fetch.map_or(fetched_at, |oldest| oldest.min(fetched_at)));
                },
                None => stats.corrupt_entries += 1,
            }
        }
        stats
    }
}

/// Write `content` to a temp file in `dir` and rename it over `path`
fn write_atomic(dir: &Utf8Path, path: &Utf8Path, content: &[u8]) -> ChannelResult<()> {
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| SprigError::io(format!("Failed to create temp file in {}", dir), e))?;
    temp.write_all(content)
        .map_err(|e| SprigError::io(format!("Failed to write cache entry {}", path), e))?;
    temp.persist(path)
        .map_err(|e| SprigError::io(format!("Failed to replace cache entry {}", path), e.error))?;
    Ok(())
}
