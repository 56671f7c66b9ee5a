//! Terminal output formatting.
//!
//! Command results go to stdout; status messages go to stderr so that
//! `--json` output stays machine readable.

pub mod colors;
pub mod errors;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
    /// Suppress status messages, for `--json`
    quiet: bool,
}

impl OutputHandler {
    /// Create an output handler; `quiet` suppresses status messages
    pub fn with_colors(colors: colors::ColorSupport, quiet: bool) -> Self {
        Self { colors, quiet }
    }

    /// Print command output
    pub fn print(&self, text: &str) {
        println!("{}", text);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", self.colors.dim(message));
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", self.colors.green("✓"), message);
        }
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", self.colors.yellow("⚠"), message);
        }
    }
}
