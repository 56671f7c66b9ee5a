//! Channel access for sprig
//!
//! This crate turns an ordered list of channels into a single in-memory
//! package index: it fetches `repodata.json` per channel and platform
//! subdirectory with retry logic, keeps an on-disk cache of every successful
//! fetch, falls back to cached or locally installed metadata when a channel
//! is unreachable, and merges everything in channel priority order.

pub mod api;
pub mod cache;
pub mod channel;
pub mod client;
pub mod index;
pub mod loader;
pub mod local;
pub mod priority;

// Re-export main types
pub use api::{FetchOutcome, FetchedRepoData, RepoData, RepoDataInfo};
pub use cache::{CacheEntry, CacheStats, ChannelCache, Freshness};
pub use channel::Channel;
pub use client::{ChannelClient, RepodataSource, RetryConfig};
pub use index::Index;
pub use loader::{ChannelFailure, Fallback, IndexLoader, LoadOptions, LoadedIndex};
pub use local::LocalPackages;
pub use priority::ChannelPriorityMap;

use sprig_core::error::SprigError;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, SprigError>;
