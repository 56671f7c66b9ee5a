//! Package records as published in channel repodata.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::match_spec::MatchSpec;
use super::version::OrderedVersion;
use crate::error::SprigResult;

/// One installable build of a package in one channel/subdir
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name
    pub name: String,
    /// Package version
    pub version: OrderedVersion,
    /// Build string (e.g. `py39h1234_0`)
    pub build: String,
    /// Build number, higher is preferred for the same version
    #[serde(default)]
    pub build_number: u64,
    /// Channel URL the record was loaded from
    #[serde(default)]
    pub channel: String,
    /// Platform subdirectory (`linux-64`, `noarch`, ...)
    #[serde(default)]
    pub subdir: String,
    /// Archive size in bytes
    #[serde(default)]
    pub size: u64,
    /// Match specs this package requires
    #[serde(default)]
    pub depends: Vec<String>,
    /// Match specs this package restricts without requiring
    #[serde(default)]
    pub constrains: Vec<String>,
    /// Archive file name, derived from name/version/build when absent
    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Fields not modelled above (license, md5, timestamp, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Identity of a record inside an index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub name: String,
    pub version: String,
    pub build: String,
    pub channel: String,
}

impl PackageRecord {
    /// Create a record with no dependencies
    pub fn new(name: &str, version: OrderedVersion, build: &str) -> Self {
        Self {
            name: name.to_string(),
            version,
            build: build.to_string(),
            build_number: 0,
            channel: String::new(),
            subdir: String::new(),
            size: 0,
            depends: Vec::new(),
            constrains: Vec::new(),
            file_name: None,
            extra: BTreeMap::new(),
        }
    }

    /// Identity key (name, version text, build, channel)
    pub fn key(&self) -> RecordKey {
        RecordKey {
            name: self.name.clone(),
            version: self.version.as_str().to_string(),
            build: self.build.clone(),
            channel: self.channel.clone(),
        }
    }

    /// Archive file name
    pub fn file_name(&self) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None => format!("{}-{}-{}.tar.bz2", self.name, self.version, self.build),
        }
    }

    /// Parse `depends` into match specs
    pub fn depends_specs(&self) -> SprigResult<Vec<MatchSpec>> {
        self.depends.iter().map(|s| MatchSpec::parse(s)).collect()
    }

    /// Parse `constrains` into match specs
    pub fn constrains_specs(&self) -> SprigResult<Vec<MatchSpec>> {
        self.constrains.iter().map(|s| MatchSpec::parse(s)).collect()
    }

    /// Full URL of the archive
    pub fn url(&self) -> String {
        format!("{}/{}/{}", self.channel.trim_end_matches('/'), self.subdir, self.file_name())
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.build)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}-{}-{}", self.channel, self.name, self.version, self.build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_repodata_entry_keeps_unknown_fields() {
        let json = serde_json::json!({
            "name": "numpy",
            "version": "1.26.4",
            "build": "py311h64a7726_0",
            "build_number": 0,
            "subdir": "linux-64",
            "depends": ["python >=3.11,<3.12.0a0", "libblas >=3.9.0"],
            "license": "BSD-3-Clause",
            "md5": "a02251cc19e4b37a0b3bad6a3e7d2ba0",
            "size": 8065890
        });

        let record: PackageRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.name, "numpy");
        assert_eq!(record.version.as_str(), "1.26.4");
        assert_eq!(record.size, 8065890);
        assert!(record.constrains.is_empty());
        assert_eq!(record.extra.get("license").and_then(|v| v.as_str()), Some("BSD-3-Clause"));
        assert_eq!(record.file_name(), "numpy-1.26.4-py311h64a7726_0.tar.bz2");
        assert_eq!(record.depends_specs().unwrap().len(), 2);
    }

    #[test]
    fn test_serialize_round_trip_is_field_for_field() {
        let mut record = PackageRecord::new("zlib", OrderedVersion::parse("1.3.1").unwrap(), "h4ab18f5_1");
        record.build_number = 1;
        record.channel = "https://conda.example.org/main".to_string();
        record.subdir = "linux-64".to_string();
        record.size = 61574;
        record.depends = vec!["libgcc-ng >=12".to_string()];
        record.constrains = vec!["zlib-ng <0".to_string()];
        record.extra.insert("license".to_string(), serde_json::json!("Zlib"));

        let text = serde_json::to_string(&record).unwrap();
        let back: PackageRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.version.as_str(), "1.3.1");
        assert_eq!(back.key(), record.key());
    }

    #[test]
    fn test_url_and_display() {
        let mut record = PackageRecord::new("tzdata", OrderedVersion::parse("2024a").unwrap(), "h0c530f3_0");
        record.channel = "https://conda.example.org/main/".to_string();
        record.subdir = "noarch".to_string();

        assert_eq!(record.to_string(), "tzdata-2024a-h0c530f3_0");
        assert_eq!(
            record.url(),
            "https://conda.example.org/main/noarch/tzdata-2024a-h0c530f3_0.tar.bz2"
        );
    }
}
