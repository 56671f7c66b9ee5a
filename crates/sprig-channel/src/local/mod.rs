//! Metadata of locally extracted packages
//!
//! Package caches keep one directory per extracted package with an
//! `info/repodata_record.json` describing where it came from. When a channel
//! cannot be fetched, these records stand in for the channel's repodata.

use camino::{Utf8Path, Utf8PathBuf};
use sprig_core::PackageRecord;
use tracing::debug;
use walkdir::WalkDir;

use crate::channel::Channel;

const RECORD_FILE: &str = "repodata_record.json";

/// Records found in local package directories
#[derive(Debug, Clone, Default)]
pub struct LocalPackages {
    records: Vec<PackageRecord>,
}

impl LocalPackages {
    /// Scan package directories for `*/info/repodata_record.json`
    pub fn scan(pkgs_dirs: &[Utf8PathBuf]) -> Self {
        let mut records = Vec::new();
        for dir in pkgs_dirs {
            records.extend(scan_dir(dir));
        }
        debug!("Found {} local package records", records.len());
        Self { records }
    }

    /// Wrap records that are already loaded
    pub fn from_records(records: Vec<PackageRecord>) -> Self {
        Self { records }
    }

    /// Records that came from `channel` for `subdir`, tagged with the channel URL
    pub fn records_for(&self, channel: &Channel, subdir: &str) -> Vec<PackageRecord> {
        self.records
            .iter()
            .filter(|record| record.subdir == subdir && same_channel(&record.channel, channel, subdir))
            .map(|record| {
                let mut record = record.clone();
                record.channel = channel.url().to_string();
                record
            })
            .collect()
    }

    /// Number of records found
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were found
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn scan_dir(dir: &Utf8Path) -> Vec<PackageRecord> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .min_depth(3)
        .max_depth(3)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name() == RECORD_FILE
                && entry.path().parent().and_then(|p| p.file_name()) == Some(std::ffi::OsStr::new("info"))
        })
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            match serde_json::from_str::<PackageRecord>(&content) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping unreadable package record {}: {}", path.display(), e);
                    None
                },
            }
        })
        .collect()
}

/// Recorded channels may be a URL, a URL ending in the subdir, or a short name
fn same_channel(recorded: &str, channel: &Channel, subdir: &str) -> bool {
    let recorded = recorded.trim_end_matches('/');
    let recorded = recorded
        .strip_suffix(subdir)
        .and_then(|r| r.strip_suffix('/'))
        .unwrap_or(recorded);
    recorded == channel.url() || recorded == channel.name()
}
