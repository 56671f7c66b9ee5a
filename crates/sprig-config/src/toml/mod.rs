//! sprig.toml parsing and serialization

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use sprig_core::error::SprigError;

use crate::ConfigResult;

/// One configuration file. Every key is optional; absent keys fall through
/// to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprigToml {
    /// Channels in priority order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,

    /// Base URL bare channel names are joined onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_alias: Option<String>,

    /// Target platform subdirectory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_index_cache: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,

    /// Fall back to locally installed package records for failed channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_unknown: Option<bool>,

    /// Package cache directories scanned for local records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkgs_dirs: Option<Vec<Utf8PathBuf>>,

    /// Repodata cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<Utf8PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Specs applied as constraints to every resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_packages: Option<Vec<String>>,
}

impl SprigToml {
    /// Overlay `other` on top of `self`: keys set in `other` win
    pub fn overlay(mut self, other: SprigToml) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
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
            pinned_packages
        );
        self
    }
}

/// Parse a configuration file's contents
pub fn parse_sprig_toml(content: &str) -> ConfigResult<SprigToml> {
    // First try with toml_edit for better error reporting
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| toml_error(content, &format!("TOML syntax error: {}", e.message()), e.span()))?;

    // Then parse with serde for type safety
    ::toml::from_str(content).map_err(|e| toml_error(content, e.message(), e.span()))
}

/// Serialize a configuration file
pub fn serialize_sprig_toml(config: &SprigToml) -> ConfigResult<String> {
    ::toml::to_string_pretty(config).map_err(|e| SprigError::TomlParse {
        message: format!("TOML serialization error: {}", e),
        line: 0,
        column: 0,
    })
}

/// Load and parse a configuration file
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<SprigToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;

    parse_sprig_toml(&content).map_err(|e| match e {
        SprigError::TomlParse { message, line, column } => SprigError::TomlParse {
            message: format!("in {}: {}", path, message),
            line,
            column,
        },
        other => other,
    })
}

fn toml_error(content: &str, message: &str, span: Option<std::ops::Range<usize>>) -> SprigError {
    let (line, column) = span.map_or((0, 0), |span| line_column(content, span.start));
    SprigError::TomlParse {
        message: message.trim().to_string(),
        line,
        column,
    }
}

/// One-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |last| last.chars().count()) + 1;
    (line, column)
}
