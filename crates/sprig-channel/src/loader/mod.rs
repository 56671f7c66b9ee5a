//! Concurrent index loading
//!
//! One job per (channel, subdir) pair, in priority order. Jobs that need the
//! network run as tokio tasks bounded by a semaphore; their results are merged
//! into the index afterwards, in job order, so the index never depends on
//! which fetch finished first. A failed channel falls back to its cache entry
//! or to local package records and is reported in [`LoadedIndex::failures`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sprig_core::types::NOARCH;
use sprig_core::PackageRecord;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::api::FetchOutcome;
use crate::cache::{CacheEntry, ChannelCache};
use crate::channel::Channel;
use crate::client::RepodataSource;
use crate::index::Index;
use crate::local::LocalPackages;
use crate::priority::ChannelPriorityMap;

/// Options for one index load
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Use an existing cache entry instead of fetching
    pub use_cache: bool,
    /// Fall back to locally installed package records
    pub include_unknown: bool,
    /// Never touch the network
    pub offline: bool,
    /// Time limit for a single channel subdirectory fetch
    pub timeout: Duration,
    /// Maximum number of concurrent fetches
    pub max_workers: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            use_cache: false,
            include_unknown: false,
            offline: false,
            timeout: Duration::from_secs(60),
            max_workers: 8,
        }
    }
}

/// What stood in for a channel subdirectory that could not be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// The last cached copy
    Cache,
    /// Records of locally installed packages from that channel
    LocalPackages,
    /// Nothing; the subdirectory contributed no records
    None,
}

/// A channel subdirectory that could not be fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelFailure {
    pub channel: String,
    pub subdir: String,
    pub reason: String,
    pub fallback: Fallback,
}

/// Result of a load: the merged index and everything that went wrong
#[derive(Debug, Clone, Default)]
pub struct LoadedIndex {
    pub index: Index,
    pub priority: ChannelPriorityMap,
    pub failures: Vec<ChannelFailure>,
}

/// How a single job ended
enum JobResult {
    /// Served from the cache without fetching
    Cached(Arc<CacheEntry>),
    /// The source answered
    Fetched(FetchOutcome),
    /// The source failed, timed out, or was not asked
    Failed(String),
}

struct Job {
    channel: Channel,
    subdir: String,
    cached: Option<Arc<CacheEntry>>,
}

/// Loads channel repodata into a single [`Index`]
#[derive(Debug)]
pub struct IndexLoader<S: RepodataSource> {
    source: Arc<S>,
    cache: Option<Arc<ChannelCache>>,
    local: LocalPackages,
}

impl<S: RepodataSource> IndexLoader<S> {
    /// Create a loader without a cache or local package records
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            cache: None,
            local: LocalPackages::default(),
        }
    }

    /// Read from and write to the given cache
    pub fn with_cache(mut self, cache: Arc<ChannelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use these records when `include_unknown` is set and a channel fails
    pub fn with_local_packages(mut self, local: LocalPackages) -> Self {
        self.local = local;
        self
    }

    /// Load every channel for `platform` and `noarch`.
    ///
    /// Never fails as a whole: unreachable channels are listed in
    /// [`LoadedIndex::failures`].
    pub async fn load(&self, channels: &[Channel], platform: &str, options: &LoadOptions) -> LoadedIndex {
        let span = info_span!("load_index", platform = %platform, channels = channels.len());
        self.load_inner(channels, platform, options).instrument(span).await
    }

    async fn load_inner(&self, channels: &[Channel], platform: &str, options: &LoadOptions) -> LoadedIndex {
        let priority = ChannelPriorityMap::prioritize(channels.iter().map(Channel::url));
        let jobs = self.plan(channels, platform, &priority).await;

        let mut results: Vec<Option<JobResult>> = Vec::with_capacity(jobs.len());
        let semaphore = Arc::new(Semaphore::new(options.max_workers.max(1)));
        let mut set: JoinSet<(usize, JobResult)> = JoinSet::new();

        for (position, job) in jobs.iter().enumerate() {
            if options.use_cache {
                if let Some(entry) = &job.cached {
                    debug!("Using cached {}/{}", job.channel, job.subdir);
                    results.push(Some(JobResult::Cached(entry.clone())));
                    continue;
                }
            }
            if options.offline && !job.channel.is_local() {
                results.push(Some(JobResult::Failed("offline mode".to_string())));
                continue;
            }
            results.push(None);

            let source = self.source.clone();
            let semaphore = semaphore.clone();
            let channel = job.channel.clone();
            let subdir = job.subdir.clone();
            let etag = job.cached.as_ref().and_then(|entry| entry.freshness.etag.clone());
            let timeout = options.timeout;

            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (position, JobResult::Failed("fetch queue closed".to_string()));
                };
                let result = match tokio::time::timeout(timeout, source.fetch(&channel, &subdir, etag.as_deref())).await
                {
                    Ok(Ok(outcome)) => JobResult::Fetched(outcome),
                    Ok(Err(e)) => JobResult::Failed(e.to_string()),
                    Err(_) => JobResult::Failed(format!("timed out after {:?}", timeout)),
                };
                (position, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(e) => warn!("Channel fetch task failed: {}", e),
            }
        }

        let mut loaded = LoadedIndex {
            index: Index::new(),
            priority,
            failures: Vec::new(),
        };
        for (job, result) in jobs.into_iter().zip(results) {
            let result = result.unwrap_or_else(|| JobResult::Failed("fetch task aborted".to_string()));
            let records = self.settle(&job, result, options, &mut loaded.failures).await;
            for record in records {
                loaded.index.insert(record);
            }
        }

        info!(
            "Loaded {} records from {} channels ({} failed subdirs)",
            loaded.index.len(),
            loaded.priority.len(),
            loaded.failures.len()
        );
        loaded
    }

    /// One job per distinct channel and subdir, in priority order
    async fn plan(&self, channels: &[Channel], platform: &str, priority: &ChannelPriorityMap) -> Vec<Job> {
        let mut subdirs = vec![platform.to_string()];
        if platform != NOARCH {
            subdirs.push(NOARCH.to_string());
        }

        let mut jobs = Vec::new();
        for url in priority.channels() {
            let Some(channel) = channels.iter().find(|c| c.url() == url) else {
                continue;
            };
            for subdir in &subdirs {
                let cached = match &self.cache {
                    Some(cache) => cache.load(channel.url(), subdir).await,
                    None => None,
                };
                jobs.push(Job {
                    channel: channel.clone(),
                    subdir: subdir.clone(),
                    cached,
                });
            }
        }
        jobs
    }

    /// Turn a job result into records, applying the fallbacks
    async fn settle(
        &self,
        job: &Job,
        result: JobResult,
        options: &LoadOptions,
        failures: &mut Vec<ChannelFailure>,
    ) -> Vec<PackageRecord> {
        match result {
            JobResult::Cached(entry) => entry.records.clone(),
            JobResult::Fetched(FetchOutcome::Modified(data)) => {
                if let Some(cache) = &self.cache {
                    let entry = CacheEntry::new(job.channel.url(), &job.subdir, data.records.clone(), data.etag);
                    if let Err(e) = cache.store(entry).await {
                        warn!("Failed to cache {}/{}: {}", job.channel, job.subdir, e);
                    }
                }
                data.records
            },
            JobResult::Fetched(FetchOutcome::NotModified) => match &job.cached {
                Some(entry) => {
                    debug!("{}/{} not modified", job.channel, job.subdir);
                    entry.records.clone()
                },
                None => self.fall_back(job, "not modified, but no cached copy".to_string(), options, failures),
            },
            JobResult::Failed(reason) => self.fall_back(job, reason, options, failures),
        }
    }

    fn fall_back(
        &self,
        job: &Job,
        reason: String,
        options: &LoadOptions,
        failures: &mut Vec<ChannelFailure>,
    ) -> Vec<PackageRecord> {
        let (fallback, records) = if let Some(entry) = &job.cached {
            (Fallback::Cache, entry.records.clone())
        } else if options.include_unknown {
            (Fallback::LocalPackages, self.local.records_for(&job.channel, &job.subdir))
        } else {
            (Fallback::None, Vec::new())
        };

        warn!(
            "Could not load {}/{}: {} (using {:?}, {} records)",
            job.channel,
            job.subdir,
            reason,
            fallback,
            records.len()
        );
        failures.push(ChannelFailure {
            channel: job.channel.url().to_string(),
            subdir: job.subdir.clone(),
            reason,
            fallback,
        });
        records
    }
}
