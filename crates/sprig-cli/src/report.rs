//! Serializable views of records and failures for `--json` output.

use serde::Serialize;
use sprig_core::{PackageRecord, SprigError};

/// One package record as reported to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordReport {
    pub name: String,
    pub version: String,
    pub build: String,
    pub build_number: u64,
    pub channel: String,
    pub subdir: String,
    pub size: u64,
    pub depends: Vec<String>,
    pub constrains: Vec<String>,
    #[serde(rename = "fn")]
    pub file_name: String,
    pub url: String,
}

impl From<&PackageRecord> for RecordReport {
    fn from(record: &PackageRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.to_string(),
            build: record.build.clone(),
            build_number: record.build_number,
            channel: record.channel.clone(),
            subdir: record.subdir.clone(),
            size: record.size,
            depends: record.depends.clone(),
            constrains: record.constrains.clone(),
            file_name: record.file_name(),
            url: record.url(),
        }
    }
}

/// A failed command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    /// Stable error kind, e.g. `PackagesNotFoundError`
    pub kind: String,
    pub message: String,
    pub unsatisfied_specs: Vec<String>,
    pub channels_searched: Vec<String>,
}

impl FailureReport {
    pub fn from_error(error: &SprigError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            unsatisfied_specs: error.unsatisfied_specs().to_vec(),
            channels_searched: error.channels_searched().to_vec(),
        }
    }

    /// Failure that did not come from sprig itself
    pub fn from_message(message: String) -> Self {
        Self {
            kind: "Error".to_string(),
            message,
            unsatisfied_specs: Vec::new(),
            channels_searched: Vec::new(),
        }
    }
}
