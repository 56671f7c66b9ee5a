//! Configuration for sprig
//!
//! This crate reads `sprig.toml` files and environment overrides, layers
//! them over built-in defaults, and produces the immutable [`Settings`]
//! value every command runs with.

pub mod merge;
pub mod settings;
pub mod toml;

// Re-export main types
pub use merge::{CliOverrides, ConfigLayering, ConfigLoader, ConfigSource};
pub use settings::Settings;
pub use toml::SprigToml;

use sprig_core::error::SprigError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, SprigError>;
