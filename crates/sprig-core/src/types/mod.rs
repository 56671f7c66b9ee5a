//! Core data types for package index resolution.
//!
//! This module provides the fundamental types used throughout sprig:
//! - Version ordering
//! - Match spec grammar
//! - Package records and their identity keys
//! - Platform subdirectories

pub mod match_spec;
pub mod platform;
pub mod record;
pub mod version;

// Re-export all public types
pub use match_spec::{BuildNumberSpec, MatchSpec, Op, StringMatch, VersionSpec};
pub use platform::{host_subdir, is_known_subdir, KNOWN_SUBDIRS, NOARCH};
pub use record::{PackageRecord, RecordKey};
pub use version::{OrderedVersion, Segment};
