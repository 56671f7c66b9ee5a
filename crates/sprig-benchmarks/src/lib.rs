//! sprig benchmarking suite
//!
//! Benchmarks for version and match spec parsing, configuration parsing and
//! dependency resolution over synthetic channel indices.

pub mod common;

pub use common::*;
