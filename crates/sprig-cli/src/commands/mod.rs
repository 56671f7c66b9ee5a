//! Command implementations and dispatch logic.
//!
//! Each command is an async function that takes a [`CommandContext`].

use std::sync::Arc;

use camino::Utf8PathBuf;
use sprig_channel::{
    Channel, ChannelCache, ChannelClient, Fallback, IndexLoader, LoadOptions, LoadedIndex, LocalPackages, RetryConfig,
};
use sprig_config::{CliOverrides, ConfigLoader, Settings};
use sprig_core::{SprigError, SprigResult};
use tracing::debug;

pub mod info;
pub mod search;
pub mod solve;


use crate::output::colors::ColorSupport;
use crate::output::OutputHandler;
use crate::{deps_mode, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub settings: Settings,
    pub output: OutputHandler,
    /// Print results as JSON
    pub json: bool,
}

impl CommandContext {
    /// Load configuration for the current directory
    pub async fn new(overrides: &CliOverrides, json: bool, colors: ColorSupport) -> SprigResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| SprigError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|path| SprigError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("{} is not valid UTF-8", path.display()),
        })?;

        let settings = ConfigLoader::new(cwd).load(overrides).await?;
        Ok(Self::with_settings(settings, json, colors))
    }

    pub fn with_settings(settings: Settings, json: bool, colors: ColorSupport) -> Self {
        Self {
            settings,
            output: OutputHandler::with_colors(colors, json),
            json,
        }
    }

    /// Load the index of `channels` for `platform` and report channels that failed
    pub async fn load_index(&self, channels: &[Channel], platform: &str) -> SprigResult<LoadedIndex> {
        let settings = &self.settings;
        let client = ChannelClient::with_config(RetryConfig::default(), settings.fetch_timeout())?;

        let mut loader = IndexLoader::new(client).with_cache(Arc::new(ChannelCache::new(settings.cache_dir.clone())));
        if settings.include_unknown {
            let pkgs_dirs = settings.pkgs_dirs.clone();
            let local = tokio::task::spawn_blocking(move || LocalPackages::scan(&pkgs_dirs))
                .await
                .map_err(|e| SprigError::io("Package directory scan failed".to_string(), std::io::Error::other(e)))?;
            loader = loader.with_local_packages(local);
        }

        let options = LoadOptions {
            use_cache: settings.use_index_cache,
            include_unknown: settings.include_unknown,
            offline: settings.offline,
            timeout: settings.fetch_timeout(),
            max_workers: settings.max_workers,
        };

        self.output.info("Loading channels...");
        let loaded = loader.load(channels, platform, &options).await;
        for failure in &loaded.failures {
            let fallback = match failure.fallback {
                Fallback::Cache => "using the cached index",
                Fallback::LocalPackages => "using local package records",
                Fallback::None => "skipped",
            };
            self.output.warn(&format!(
                "{}/{} unavailable ({}), {}",
                failure.channel, failure.subdir, failure.reason, fallback
            ));
        }
        Ok(loaded)
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> SprigResult<()> {
    match command {
        Commands::Search { spec, info, reverse_dependency, .. } => {
            debug!("Searching for {:?} (reverse: {})", spec, reverse_dependency);
            let args = search::SearchArgs {
                spec,
                info,
                reverse_dependency,
            };
            search::execute(&args, ctx).await
        },
        Commands::Info { packages, .. } => {
            debug!("Showing info for {:?}", packages);
            info::execute(&packages, ctx).await
        },
        Commands::Solve { specs, no_deps, only_deps, .. } => {
            let mode = deps_mode(no_deps, only_deps);
            debug!("Solving {:?} ({:?})", specs, mode);
            solve::execute(&specs, mode, ctx).await
        },
    }
}

/// Closest candidate to `input` by edit distance, if any is close enough
pub fn suggest_similar<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let max_distance = (input.chars().count() / 3).max(2);
    let mut best: Option<(usize, &str)> = None;

    for candidate in candidates {
        if candidate == input {
            continue;
        }
        let distance = edit_distance(input, candidate);
        if distance > max_distance {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_distance, best_name)) => (distance, candidate) < (best_distance, best_name),
        };
        if better {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, name)| name.to_string())
}

/// Calculate edit distance between two strings
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // single rolling row
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, &ac) in a_chars.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &bc) in b_chars.iter().enumerate() {
            let cost = usize::from(ac != bc);
            let next = (row[j] + 1).min(row[j + 1] + 1).min(diagonal + cost);
            diagonal = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b_chars.len()]
}
