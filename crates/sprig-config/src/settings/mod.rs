//! Resolved settings

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use sprig_channel::channel::{Channel, DEFAULT_CHANNEL_ALIAS};
use sprig_core::error::SprigError;
use sprig_core::types::{host_subdir, is_known_subdir};
use sprig_core::MatchSpec;

use crate::merge::ConfigSource;
use crate::toml::SprigToml;
use crate::ConfigResult;

const DEFAULT_CHANNEL: &str = "conda-forge";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_WORKERS: usize = 8;

/// Immutable settings every command runs with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Channels in priority order, as configured
    pub channels: Vec<String>,
    pub channel_alias: String,
    /// Target platform subdirectory
    pub subdir: String,
    pub use_index_cache: bool,
    pub offline: bool,
    pub include_unknown: bool,
    pub pkgs_dirs: Vec<Utf8PathBuf>,
    pub cache_dir: Utf8PathBuf,
    pub fetch_timeout_secs: u64,
    pub max_workers: usize,
    pub pinned_packages: Vec<String>,
    /// Where the values came from, lowest precedence first
    #[serde(skip)]
    pub sources: Vec<ConfigSource>,
}

impl Settings {
    /// Built-in defaults, with per-user paths under `home`
    pub fn defaults(home: Option<&Utf8Path>) -> Self {
        let sprig_home = home.map(|h| h.join(".sprig"));
        let cache_dir = dirs::cache_dir()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .filter(|_| home.is_some())
            .map(|dir| dir.join("sprig"))
            .or_else(|| sprig_home.as_ref().map(|h| h.join("cache")))
            .unwrap_or_else(|| Utf8PathBuf::from(".sprig").join("cache"));

        Self {
            channels: vec![DEFAULT_CHANNEL.to_string()],
            channel_alias: DEFAULT_CHANNEL_ALIAS.to_string(),
            subdir: Self::default_subdir(),
            use_index_cache: false,
            offline: false,
            include_unknown: false,
            pkgs_dirs: sprig_home.iter().map(|h| h.join("pkgs")).collect(),
            cache_dir,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
            pinned_packages: Vec::new(),
            sources: vec![ConfigSource::Default],
        }
    }

    /// Subdirectory of the host platform (`linux-64`, `osx-arm64`, `win-64`, ...)
    pub fn default_subdir() -> String {
        host_subdir()
    }

    /// Apply a configuration file's keys on top of these settings
    pub fn apply(&mut self, config: SprigToml) {
        let SprigToml {
            channels,
            channel_alias,
            subdir,
            use_index_cache,
            offline,
            include_unknown,
            pkgs_dirs,
            cache_dir,
            fetch_timeout_secs,
            max_workers,
            pinned_packages,
        } = config;

        if let Some(channels) = channels {
            self.channels = channels;
        }
        if let Some(alias) = channel_alias {
            self.channel_alias = alias;
        }
        if let Some(subdir) = subdir {
            self.subdir = subdir;
        }
        if let Some(value) = use_index_cache {
            self.use_index_cache = value;
        }
        if let Some(value) = offline {
            self.offline = value;
        }
        if let Some(value) = include_unknown {
            self.include_unknown = value;
        }
        if let Some(dirs) = pkgs_dirs {
            self.pkgs_dirs = dirs;
        }
        if let Some(dir) = cache_dir {
            self.cache_dir = dir;
        }
        if let Some(secs) = fetch_timeout_secs {
            self.fetch_timeout_secs = secs;
        }
        if let Some(workers) = max_workers {
            self.max_workers = workers;
        }
        if let Some(pinned) = pinned_packages {
            self.pinned_packages = pinned;
        }
    }

    /// Per-channel fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Configured channels, parsed against the channel alias
    pub fn parsed_channels(&self) -> ConfigResult<Vec<Channel>> {
        self.channels
            .iter()
            .map(|c| Channel::parse(c, &self.channel_alias))
            .collect()
    }

    /// Pinned packages as match specs
    pub fn pinned_specs(&self) -> ConfigResult<Vec<MatchSpec>> {
        self.pinned_packages.iter().map(|s| MatchSpec::parse(s)).collect()
    }

    /// Configuration files that contributed to these settings
    pub fn config_files(&self) -> Vec<&Utf8Path> {
        self.sources
            .iter()
            .filter_map(|source| match source {
                ConfigSource::Global(path) | ConfigSource::Project(path) => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Check the settings are usable
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, reason: String| SprigError::ConfigValidation {
            field: field.to_string(),
            reason,
        };

        if self.channels.is_empty() {
            return Err(invalid("channels", "at least one channel is required".to_string()));
        }
        self.parsed_channels()?;

        if !is_known_subdir(&self.subdir) {
            return Err(invalid(
                "subdir",
                format!("'{}' is not a known platform subdirectory (e.g. linux-64, osx-arm64, noarch)", self.subdir),
            ));
        }
        if self.max_workers == 0 {
            return Err(invalid("max_workers", "must be at least 1".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid("fetch_timeout_secs", "must be at least 1".to_string()));
        }
        for spec in &self.pinned_packages {
            MatchSpec::parse(spec).map_err(|e| invalid("pinned_packages", e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Settings {
        Settings::defaults(Some(Utf8Path::new("/home/tester")))
    }

    #[test]
    fn test_defaults() {
        let settings = defaults();
        assert_eq!(settings.channels, vec!["conda-forge".to_string()]);
        assert_eq!(settings.channel_alias, DEFAULT_CHANNEL_ALIAS);
        assert_eq!(settings.pkgs_dirs, vec![Utf8PathBuf::from("/home/tester/.sprig/pkgs")]);
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(60));
        assert!(settings.validate().is_ok());
        assert!(settings.config_files().is_empty());

        let homeless = Settings::defaults(None);
        assert!(homeless.pkgs_dirs.is_empty());
        assert_eq!(homeless.cache_dir, Utf8PathBuf::from(".sprig/cache"));
    }

    #[test]
    fn test_apply_only_set_keys() {
        let mut settings = defaults();
        settings.apply(SprigToml {
            subdir: Some("osx-arm64".to_string()),
            max_workers: Some(2),
            ..SprigToml::default()
        });
        assert_eq!(settings.subdir, "osx-arm64");
        assert_eq!(settings.max_workers, 2);
        assert_eq!(settings.channels, vec!["conda-forge".to_string()]);
    }

    #[test]
    fn test_parsed_channels_use_alias() {
        let mut settings = defaults();
        settings.channel_alias = "https://mirror.example.com/".to_string();
        settings.channels = vec!["bioconda".to_string(), "https://repo.example.com/internal/".to_string()];

        let channels = settings.parsed_channels().unwrap();
        assert_eq!(channels[0].url(), "https://mirror.example.com/bioconda");
        assert_eq!(channels[1].url(), "https://repo.example.com/internal");
    }

    #[test]
    fn test_validation_errors_name_the_field() {
        let field_of = |settings: Settings| match settings.validate() {
            Err(SprigError::ConfigValidation { field, .. }) => field,
            other => panic!("expected ConfigValidation, got {:?}", other),
        };

        let mut settings = defaults();
        settings.channels.clear();
        assert_eq!(field_of(settings), "channels");

        let mut settings = defaults();
        settings.subdir = "amiga-68k".to_string();
        assert_eq!(field_of(settings), "subdir");

        let mut settings = defaults();
        settings.max_workers = 0;
        assert_eq!(field_of(settings), "max_workers");

        let mut settings = defaults();
        settings.pinned_packages = vec!["python >=3.11 build extra".to_string()];
        assert_eq!(field_of(settings), "pinned_packages");

        let mut settings = defaults();
        settings.channels = vec!["ftp://example.com/channel".to_string()];
        assert_eq!(field_of(settings), "channels");
    }

    #[test]
    fn test_pinned_specs() {
        let mut settings = defaults();
        settings.pinned_packages = vec!["python 3.11.*".to_string(), "numpy<2".to_string()];
        let pinned = settings.pinned_specs().unwrap();
        assert_eq!(pinned.len(), 2);
        assert_eq!(pinned[1].exact_name(), Some("numpy"));
    }
}
