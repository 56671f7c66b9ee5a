//! # sprig-core
//!
//! Core types shared across all sprig crates.
//!
//! This crate provides:
//! - `OrderedVersion`, the total order used to rank package versions
//! - `MatchSpec`, the query grammar used to request packages
//! - `PackageRecord`, one installable build of a package in a channel
//! - `SprigError` enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (versions, match specs, records)
//! - `error`: Error types and result aliases
//! - `utils`: Hashing helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Conflict, SprigError, SprigResult};
pub use types::{MatchSpec, OrderedVersion, PackageRecord, RecordKey, VersionSpec};
