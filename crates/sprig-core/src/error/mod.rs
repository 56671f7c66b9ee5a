//! Error types and result aliases for sprig operations.
//!
//! Provides a unified error type that covers grammar, channel, resolution and
//! configuration failures with actionable error messages.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for all sprig operations
#[derive(Error, Debug)]
pub enum SprigError {
    // Grammar errors
    #[error("Malformed version '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    #[error("Invalid match spec '{spec}': unexpected '{token}'")]
    InvalidSpec { spec: String, token: String },

    // Channel errors
    #[error("Failed to fetch {channel}/{subdir}: {message}")]
    ChannelFetchFailed {
        channel: String,
        subdir: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Resolution errors
    #[error(
        "Packages not found in channels: {}\nChannels searched:\n  {}",
        .specs.join(", "),
        .channels.join("\n  ")
    )]
    PackagesNotFound {
        specs: Vec<String>,
        channels: Vec<String>,
    },

    #[error("Cannot satisfy requested specs: {}{}", .specs.join(", "), format_conflicts(.conflicts))]
    Unsatisfiable {
        specs: Vec<String>,
        conflicts: Vec<Conflict>,
        channels: Vec<String>,
    },

    #[error("Resolution was cancelled")]
    Cancelled,

    // Config errors
    #[error("Failed to parse config: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("Failed to parse JSON: {message}")]
    Json { message: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Requirements placed on one package name that could not be met together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// Package name the requirements apply to
    pub package: String,
    /// Requirement spec paired with the package (or root request) that imposed it
    pub requirements: Vec<(String, String)>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.package)?;
        for (spec, origin) in &self.requirements {
            write!(f, " [{} <- {}]", spec, origin)?;
        }
        Ok(())
    }
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|conflict| format!("\n  {}", conflict))
        .collect()
}

/// Result type alias for sprig operations
pub type SprigResult<T> = Result<T, SprigError>;

impl SprigError {
    /// Create a channel fetch error from any error type
    pub fn fetch<E>(channel: &str, subdir: &str, message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ChannelFetchFailed {
            channel: channel.to_string(),
            subdir: subdir.to_string(),
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Stable identifier used in structured failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            SprigError::MalformedVersion { .. } => "MalformedVersion",
            SprigError::InvalidSpec { .. } => "InvalidSpec",
            SprigError::ChannelFetchFailed { .. } => "ChannelFetchFailed",
            SprigError::PackagesNotFound { .. } => "PackagesNotFoundError",
            SprigError::Unsatisfiable { .. } => "UnsatisfiableError",
            SprigError::Cancelled => "Cancelled",
            SprigError::TomlParse { .. }
            | SprigError::ConfigValidation { .. }
            | SprigError::Json { .. } => "ConfigError",
            SprigError::Io { .. } => "IoError",
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SprigError::ChannelFetchFailed { .. } | SprigError::Io { .. }
        )
    }

    /// Specs named by a resolution failure
    pub fn unsatisfied_specs(&self) -> &[String] {
        match self {
            SprigError::PackagesNotFound { specs, .. } | SprigError::Unsatisfiable { specs, .. } => {
                specs
            },
            _ => &[],
        }
    }

    /// Channels a resolution failure searched
    pub fn channels_searched(&self) -> &[String] {
        match self {
            SprigError::PackagesNotFound { channels, .. } | SprigError::Unsatisfiable { channels, .. } => channels,
            _ => &[],
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SprigError::PackagesNotFound { .. } => {
                Some("Check the package name spelling, or add a channel that provides it with -c")
            },
            SprigError::Unsatisfiable { .. } => {
                Some("Relax the version constraints or remove one of the conflicting specs")
            },
            SprigError::ChannelFetchFailed { .. } => {
                Some("Check your connection, or retry with --use-index-cache or --offline")
            },
            SprigError::InvalidSpec { .. } => {
                Some("Match specs look like 'name', 'name 1.2.*', 'name>=1.0,<2' or 'channel::name[build=py*]'")
            },
            SprigError::TomlParse { .. } | SprigError::ConfigValidation { .. } => {
                Some("Fix the configuration file or the matching SPRIG_* environment variable")
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packages_not_found_lists_specs_and_channels() {
        let error = SprigError::PackagesNotFound {
            specs: vec!["ghost-package".to_string()],
            channels: vec![
                "https://conda.example.org/main/linux-64".to_string(),
                "https://conda.example.org/main/noarch".to_string(),
            ],
        };

        let message = error.to_string();
        assert!(message.contains("ghost-package"));
        assert!(message.contains("https://conda.example.org/main/linux-64"));
        assert!(message.contains("https://conda.example.org/main/noarch"));
        assert_eq!(error.kind(), "PackagesNotFoundError");
        assert_eq!(error.unsatisfied_specs(), &["ghost-package".to_string()]);
    }

    #[test]
    fn test_unsatisfiable_renders_conflicts() {
        let error = SprigError::Unsatisfiable {
            specs: vec!["a>=2.0".to_string(), "a<1.0".to_string()],
            conflicts: vec![Conflict {
                package: "a".to_string(),
                requirements: vec![
                    ("a>=2.0".to_string(), "requested".to_string()),
                    ("a<1.0".to_string(), "requested".to_string()),
                ],
            }],
            channels: vec!["https://conda.example.org/main".to_string()],
        };

        let message = error.to_string();
        assert!(message.contains("a>=2.0, a<1.0"));
        assert!(message.contains("a: [a>=2.0 <- requested] [a<1.0 <- requested]"));
        assert!(!error.is_recoverable());
        assert_eq!(error.channels_searched(), &["https://conda.example.org/main".to_string()]);
    }

    #[test]
    fn test_fetch_error_is_recoverable_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let error = SprigError::fetch("https://conda.example.org/main", "noarch", "request failed".to_string(), io);

        assert!(error.is_recoverable());
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.suggestion().is_some());
    }
}
