//! Channel locations
//!
//! A channel is either a full URL (`https://...`, `file://...`), a local
//! directory path, or a bare name such as `conda-forge` that is resolved
//! against the configured channel alias.

use std::fmt;
use std::path::PathBuf;

use sprig_core::error::SprigError;
use url::Url;

use crate::ChannelResult;

/// Default alias that bare channel names are joined onto
pub const DEFAULT_CHANNEL_ALIAS: &str = "https://conda.anaconda.org";

/// A normalized channel location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Base URL without a trailing slash
    url: String,
    /// Short display name (`conda-forge`), or the URL for unaliased channels
    name: String,
}

impl Channel {
    /// Parse a channel name, URL or path
    pub fn parse(text: &str, channel_alias: &str) -> ChannelResult<Self> {
        let invalid = |reason: String| SprigError::ConfigValidation {
            field: "channels".to_string(),
            reason,
        };

        let text = text.trim().trim_end_matches('/');
        if text.is_empty() {
            return Err(invalid("channel name is empty".to_string()));
        }

        if text.contains("://") {
            let url = Url::parse(text).map_err(|e| invalid(format!("invalid channel URL '{}': {}", text, e)))?;
            if !matches!(url.scheme(), "http" | "https" | "file") {
                return Err(invalid(format!("unsupported channel scheme '{}'", url.scheme())));
            }
            let url = url.as_str().trim_end_matches('/').to_string();
            let alias = channel_alias.trim_end_matches('/');
            let name = url
                .strip_prefix(alias)
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| url.clone());
            return Ok(Self { url, name });
        }

        if text.starts_with('/') || text.starts_with("./") || text.starts_with("../") {
            let path = if text.starts_with('/') {
                PathBuf::from(text)
            } else {
                std::env::current_dir()
                    .map_err(|e| invalid(format!("invalid channel path '{}': {}", text, e)))?
                    .join(text)
            };
            let url = Url::from_directory_path(&path)
                .map_err(|_| invalid(format!("invalid channel path '{}'", text)))?;
            let url = url.as_str().trim_end_matches('/').to_string();
            return Ok(Self { name: url.clone(), url });
        }

        if let Some(bad) = text
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "-_./".contains(*c)))
        {
            return Err(invalid(format!("invalid character '{}' in channel name '{}'", bad, text)));
        }

        Ok(Self {
            url: format!("{}/{}", channel_alias.trim_end_matches('/'), text),
            name: text.to_string(),
        })
    }

    /// Base URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Canonical short name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL of one platform subdirectory
    pub fn subdir_url(&self, subdir: &str) -> String {
        format!("{}/{}", self.url, subdir)
    }

    /// Whether the channel lives on the local filesystem
    pub fn is_local(&self) -> bool {
        self.url.starts_with("file://")
    }

    /// Filesystem directory of a local channel
    pub fn local_path(&self) -> Option<PathBuf> {
        if !self.is_local() {
            return None;
        }
        Url::parse(&self.url).ok()?.to_file_path().ok()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIAS: &str = "https://conda.example.org";

    #[test]
    fn test_bare_name_uses_alias() {
        let channel = Channel::parse("conda-forge", ALIAS).unwrap();
        assert_eq!(channel.url(), "https://conda.example.org/conda-forge");
        assert_eq!(channel.name(), "conda-forge");
        assert_eq!(
            channel.subdir_url("linux-64"),
            "https://conda.example.org/conda-forge/linux-64"
        );
        assert!(!channel.is_local());
    }

    #[test]
    fn test_multi_segment_name() {
        let channel = Channel::parse("pkgs/main/", ALIAS).unwrap();
        assert_eq!(channel.url(), "https://conda.example.org/pkgs/main");
        assert_eq!(channel.name(), "pkgs/main");
    }

    #[test]
    fn test_full_url_keeps_short_name_under_alias() {
        let channel = Channel::parse("https://conda.example.org/bioconda/", ALIAS).unwrap();
        assert_eq!(channel.url(), "https://conda.example.org/bioconda");
        assert_eq!(channel.name(), "bioconda");

        let other = Channel::parse("https://mirror.example.net/forge", ALIAS).unwrap();
        assert_eq!(other.name(), "https://mirror.example.net/forge");
    }

    #[test]
    fn test_file_channels() {
        let channel = Channel::parse("file:///srv/channel", ALIAS).unwrap();
        assert!(channel.is_local());
        assert_eq!(channel.local_path(), Some(PathBuf::from("/srv/channel")));

        let path = Channel::parse("/srv/channel", ALIAS).unwrap();
        assert_eq!(path.url(), "file:///srv/channel");
    }

    #[test]
    fn test_invalid_channels() {
        assert!(Channel::parse("", ALIAS).is_err());
        assert!(Channel::parse("ftp://example.org/x", ALIAS).is_err());
        assert!(matches!(
            Channel::parse("bad channel", ALIAS),
            Err(SprigError::ConfigValidation { .. })
        ));
    }
}
