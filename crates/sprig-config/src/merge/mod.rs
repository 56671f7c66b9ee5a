//! Configuration layering, discovery, and environment overrides
//!
//! Layers apply lowest precedence first: built-in defaults, the global
//! `~/.sprig/config.toml`, the nearest project `sprig.toml`, `SPRIG_*`
//! environment variables, and finally command-line flags.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use sprig_core::error::SprigError;
use tracing::debug;

use crate::settings::Settings;
use crate::toml::SprigToml;
use crate::ConfigResult;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "sprig.toml";

/// Prefix of environment variables read as overrides
pub const ENV_PREFIX: &str = "SPRIG_";

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// Global config file
    Global(Utf8PathBuf),
    /// Project sprig.toml file
    Project(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    /// `-c/--channel`, in the order given
    pub channels: Vec<String>,
    /// Replace configured channels instead of prepending to them
    pub override_channels: bool,
    pub subdir: Option<String>,
    pub use_index_cache: Option<bool>,
    pub offline: Option<bool>,
    pub include_unknown: Option<bool>,
}

impl CliOverrides {
    fn is_empty(&self) -> bool {
        self.channels.is_empty()
            && !self.override_channels
            && self.subdir.is_none()
            && self.use_index_cache.is_none()
            && self.offline.is_none()
            && self.include_unknown.is_none()
    }
}

/// Main configuration loading interface
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Home directory, for the global config and default paths
    home: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader rooted at `cwd`
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let home = dirs::home_dir().and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok());
        Self { cwd, home }
    }

    /// Use a specific home directory instead of the user's
    pub fn with_home(mut self, home: Option<Utf8PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Find a configuration file, walking up from the working directory
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        let mut current = Some(self.cwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                return Some(candidate);
            }
            current = dir.parent();
        }
        None
    }

    /// Location of the global configuration file
    pub fn global_config_path(&self) -> Option<Utf8PathBuf> {
        self.home.as_ref().map(|home| home.join(".sprig").join("config.toml"))
    }

    /// Load global configuration, if present
    pub async fn load_global_config(&self) -> ConfigResult<Option<(SprigToml, Utf8PathBuf)>> {
        match self.global_config_path() {
            Some(path) if path.is_file() => {
                let config = crate::toml::load_from_file(&path).await?;
                Ok(Some((config, path)))
            },
            _ => Ok(None),
        }
    }

    /// Load the nearest project configuration, if any
    pub async fn load_project_config(&self) -> ConfigResult<Option<(SprigToml, Utf8PathBuf)>> {
        match self.resolve_config_path(PROJECT_CONFIG_FILE) {
            Some(path) => {
                let config = crate::toml::load_from_file(&path).await?;
                Ok(Some((config, path)))
            },
            None => Ok(None),
        }
    }

    /// Load every layer and produce validated settings
    pub async fn load(&self, cli: &CliOverrides) -> ConfigResult<Settings> {
        let global = self.load_global_config().await?;
        let project = self.load_project_config().await?;
        let env = ConfigLayering::collect_env_overrides();

        let settings = ConfigLayering::merge_configs(self.home.as_deref(), global, project, &env, cli)?;
        settings.validate()?;
        debug!(
            "Configuration loaded from {} sources ({} files)",
            settings.sources.len(),
            settings.config_files().len()
        );
        Ok(settings)
    }
}

/// Configuration layering and merging
pub struct ConfigLayering;

impl ConfigLayering {
    /// Merge all layers over the built-in defaults
    pub fn merge_configs(
        home: Option<&Utf8Path>,
        global: Option<(SprigToml, Utf8PathBuf)>,
        project: Option<(SprigToml, Utf8PathBuf)>,
        env_overrides: &HashMap<String, String>,
        cli_overrides: &CliOverrides,
    ) -> ConfigResult<Settings> {
        let mut settings = Settings::defaults(home);

        if let Some((config, path)) = global {
            settings.apply(config);
            settings.sources.push(ConfigSource::Global(path));
        }
        if let Some((config, path)) = project {
            settings.apply(config);
            settings.sources.push(ConfigSource::Project(path));
        }

        Self::apply_env_overrides(&mut settings, env_overrides)?;
        Self::apply_cli_overrides(&mut settings, cli_overrides);

        Ok(settings)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(settings: &mut Settings, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        // sorted so sources are recorded deterministically
        let mut keys: Vec<&String> = overrides.keys().collect();
        keys.sort();

        for key in keys {
            let value = overrides[key].trim();
            match key.as_str() {
                "SPRIG_CHANNELS" => {
                    settings.channels = value
                        .split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect();
                },
                "SPRIG_CHANNEL_ALIAS" => settings.channel_alias = value.to_string(),
                "SPRIG_SUBDIR" => settings.subdir = value.to_string(),
                "SPRIG_OFFLINE" => settings.offline = parse_bool(key, value)?,
                "SPRIG_USE_INDEX_CACHE" => settings.use_index_cache = parse_bool(key, value)?,
                "SPRIG_INCLUDE_UNKNOWN" => settings.include_unknown = parse_bool(key, value)?,
                "SPRIG_CACHE_DIR" => settings.cache_dir = Utf8PathBuf::from(value),
                "SPRIG_FETCH_TIMEOUT" => {
                    settings.fetch_timeout_secs = value.parse().map_err(|e| SprigError::ConfigValidation {
                        field: key.clone(),
                        reason: format!("expected a number of seconds, got '{}': {}", value, e),
                    })?;
                },
                _ => {
                    // Unknown environment variable, ignore
                    continue;
                },
            }
            settings.sources.push(ConfigSource::Environment(key.clone()));
        }

        Ok(())
    }

    /// Apply CLI flag overrides
    fn apply_cli_overrides(settings: &mut Settings, cli: &CliOverrides) {
        if cli.is_empty() {
            return;
        }

        if cli.override_channels {
            settings.channels = cli.channels.clone();
        } else if !cli.channels.is_empty() {
            let mut channels = cli.channels.clone();
            channels.extend(settings.channels.iter().filter(|c| !cli.channels.contains(c)).cloned());
            settings.channels = channels;
        }
        if let Some(subdir) = &cli.subdir {
            settings.subdir = subdir.clone();
        }
        if let Some(value) = cli.use_index_cache {
            settings.use_index_cache = value;
        }
        if let Some(value) = cli.offline {
            settings.offline = value;
        }
        if let Some(value) = cli.include_unknown {
            settings.include_unknown = value;
        }
        settings.sources.push(ConfigSource::CommandLine);
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)).collect()
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(SprigError::ConfigValidation {
            field: key.to_string(),
            reason: format!("expected a boolean (true/false), got '{}'", value),
        }),
    }
}
