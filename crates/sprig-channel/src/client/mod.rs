//! Repodata fetching with connection pooling and retry logic

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, ClientBuilder, StatusCode};
use sprig_core::error::SprigError;
use tracing::debug;

use crate::api::{FetchOutcome, FetchedRepoData, RepoData};
use crate::channel::Channel;
use crate::ChannelResult;

const REPODATA_FILE: &str = "repodata.json";

/// Source of channel repodata.
///
/// The index loader only talks to channels through this trait, so tests and
/// alternative transports can stand in for HTTP.
pub trait RepodataSource: Send + Sync + 'static {
    /// Fetch the repodata of one channel subdirectory.
    ///
    /// `etag` is the entity tag of a cached copy; a source may answer
    /// [`FetchOutcome::NotModified`] when it still matches.
    fn fetch(
        &self,
        channel: &Channel,
        subdir: &str,
        etag: Option<&str>,
    ) -> impl Future<Output = ChannelResult<FetchOutcome>> + Send;
}

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// A failed attempt and whether trying again could help
struct Attempt {
    error: SprigError,
    retryable: bool,
}

impl Attempt {
    fn retry(error: SprigError) -> Self {
        Self { error, retryable: true }
    }

    fn fatal(error: SprigError) -> Self {
        Self { error, retryable: false }
    }
}

/// HTTP and `file://` repodata client
#[derive(Debug, Clone)]
pub struct ChannelClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Retry configuration
    retry_config: RetryConfig,
}

impl ChannelClient {
    /// Create new client with default retry and request timeout settings
    pub fn new() -> ChannelResult<Self> {
        Self::with_config(RetryConfig::default(), Duration::from_secs(60))
    }

    /// Create client with custom retry configuration and per-request timeout
    pub fn with_config(retry_config: RetryConfig, request_timeout: Duration) -> ChannelResult<Self> {
        let client = ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(request_timeout)
            .gzip(true)
            .user_agent(concat!("sprig/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SprigError::ChannelFetchFailed {
                channel: String::new(),
                subdir: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { client, retry_config })
    }

    /// Execute an operation with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ChannelResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, Attempt>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(failure) => {
                    if !failure.retryable || attempt >= self.retry_config.max_retries {
                        return Err(failure.error);
                    }
                    attempt += 1;
                    debug!("Retrying after {:?} (attempt {}): {}", delay, attempt, failure.error);

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(
                        Duration::from_millis((delay.as_millis() as f64 * self.retry_config.multiplier) as u64),
                        self.retry_config.max_delay,
                    );
                },
            }
        }
    }

    /// Fetch `repodata.json` for one channel subdirectory
    pub async fn fetch_repodata(
        &self,
        channel: &Channel,
        subdir: &str,
        etag: Option<&str>,
    ) -> ChannelResult<FetchOutcome> {
        if channel.is_local() {
            return self.fetch_local(channel, subdir).await;
        }

        let url = format!("{}/{}", channel.subdir_url(subdir), REPODATA_FILE);
        debug!("Fetching {}", url);

        self.with_retry(|| async {
            let mut request = self.client.get(&url);
            if let Some(etag) = etag {
                request = request.header(IF_NONE_MATCH, etag);
            }

            let response = request.send().await.map_err(|e| {
                Attempt::retry(SprigError::fetch(
                    channel.url(),
                    subdir,
                    format!("request to {} failed: {}", url, e),
                    e,
                ))
            })?;

            let status = response.status();
            match status {
                StatusCode::NOT_MODIFIED => Ok(FetchOutcome::NotModified),
                status if status.is_success() => {
                    let etag = response
                        .headers()
                        .get(ETAG)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    let body = response.bytes().await.map_err(|e| {
                        Attempt::retry(SprigError::fetch(
                            channel.url(),
                            subdir,
                            format!("failed to read {}: {}", url, e),
                            e,
                        ))
                    })?;
                    let records = parse_repodata(&body, channel, subdir).map_err(Attempt::fatal)?;
                    Ok(FetchOutcome::Modified(FetchedRepoData { records, etag }))
                },
                status => {
                    let error = SprigError::ChannelFetchFailed {
                        channel: channel.url().to_string(),
                        subdir: subdir.to_string(),
                        message: format!("{} returned HTTP {}", url, status),
                        source: None,
                    };
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        Err(Attempt::retry(error))
                    } else {
                        Err(Attempt::fatal(error))
                    }
                },
            }
        })
        .await
    }

    async fn fetch_local(&self, channel: &Channel, subdir: &str) -> ChannelResult<FetchOutcome> {
        let path = channel
            .local_path()
            .ok_or_else(|| SprigError::ChannelFetchFailed {
                channel: channel.url().to_string(),
                subdir: subdir.to_string(),
                message: "not a local channel path".to_string(),
                source: None,
            })?
            .join(subdir)
            .join(REPODATA_FILE);
        debug!("Reading {}", path.display());

        let body = tokio::fs::read(&path).await.map_err(|e| {
            SprigError::fetch(channel.url(), subdir, format!("failed to read {}: {}", path.display(), e), e)
        })?;
        let records = parse_repodata(&body, channel, subdir)?;
        Ok(FetchOutcome::Modified(FetchedRepoData { records, etag: None }))
    }
}

fn parse_repodata(body: &[u8], channel: &Channel, subdir: &str) -> ChannelResult<Vec<sprig_core::PackageRecord>> {
    let repodata: RepoData = serde_json::from_slice(body).map_err(|e| {
        SprigError::fetch(channel.url(), subdir, format!("invalid repodata: {}", e), e)
    })?;
    Ok(repodata.into_records(channel.url(), subdir))
}

impl RepodataSource for ChannelClient {
    fn fetch(
        &self,
        channel: &Channel,
        subdir: &str,
        etag: Option<&str>,
    ) -> impl Future<Output = ChannelResult<FetchOutcome>> + Send {
        self.fetch_repodata(channel, subdir, etag)
    }
}

#[cfg(test)]
mod tests;
