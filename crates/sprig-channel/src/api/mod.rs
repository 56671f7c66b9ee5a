//! Channel repodata document types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sprig_core::PackageRecord;

/// `repodata.json` as served by a channel subdirectory
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoData {
    /// Document metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<RepoDataInfo>,
    /// `.tar.bz2` packages keyed by file name
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
    /// `.conda` packages keyed by file name
    #[serde(default, rename = "packages.conda")]
    pub packages_conda: BTreeMap<String, PackageRecord>,
    /// Schema revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repodata_version: Option<u32>,
}

/// The `info` block of a repodata document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoDataInfo {
    /// Subdirectory the document describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
}

impl RepoData {
    /// Flatten into records tagged with their channel and subdir.
    ///
    /// Records come out in file-name order, `.tar.bz2` entries first.
    pub fn into_records(self, channel_url: &str, subdir: &str) -> Vec<PackageRecord> {
        let default_subdir = self
            .info
            .and_then(|info| info.subdir)
            .unwrap_or_else(|| subdir.to_string());

        self.packages
            .into_iter()
            .chain(self.packages_conda)
            .map(|(file_name, mut record)| {
                record.channel = channel_url.to_string();
                if record.subdir.is_empty() {
                    record.subdir = default_subdir.clone();
                }
                record.file_name = Some(file_name);
                record
            })
            .collect()
    }
}

/// Records fetched from one channel subdirectory
#[derive(Debug, Clone)]
pub struct FetchedRepoData {
    /// Parsed records, tagged with their channel
    pub records: Vec<PackageRecord>,
    /// Entity tag returned by the server, for conditional refetches
    pub etag: Option<String>,
}

/// Result of a (possibly conditional) repodata fetch
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The server returned a new document
    Modified(FetchedRepoData),
    /// The server confirmed the cached copy is current
    NotModified,
}
