//! Dependency resolution for sprig
//!
//! This crate matches specs against a loaded package index and resolves a
//! set of root specs into one consistent record per package name, using
//! constraint propagation with chronological backtracking. Results are
//! deterministic for a given index, channel priority and request.

pub mod graph;
pub mod matcher;
pub mod solver;

// Re-export main types
pub use graph::DependencyGraph;
pub use matcher::{matches, reverse_dependencies, search, select_candidates, CandidateOrdering};
pub use solver::{Cancellation, DepsMode, Resolution, ResolveOptions, Resolver};

use sprig_core::error::SprigError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, SprigError>;
