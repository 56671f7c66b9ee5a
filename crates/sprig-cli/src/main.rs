//! # sprig-cli
//!
//! Search and resolve packages across prioritized conda-style channels.
//!
//! This is the entry point for the `sprig` binary. It parses arguments, sets
//! up logging and the panic hook, runs the command on a Tokio runtime and
//! turns failures into an exit code and an error report.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sprig_config::CliOverrides;
use sprig_resolver::DepsMode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod report;

use commands::CommandContext;
use output::colors::ColorSupport;
use output::errors::ErrorFormatter;
use report::FailureReport;

/// Search and resolve packages across prioritized channels
#[derive(Parser, Debug)]
#[command(name = "sprig", version, about = "Multi-channel package search and resolution")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report results and failures as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Never color terminal output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Color support for this invocation
    pub fn colors(&self) -> ColorSupport {
        if self.no_color {
            ColorSupport::disabled()
        } else {
            ColorSupport::detect()
        }
    }
}

/// Channel selection and index loading flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ChannelArgs {
    /// Additional channel to search, highest priority first
    #[arg(short = 'c', long = "channel", value_name = "CHANNEL")]
    pub channels: Vec<String>,

    /// Do not search configured channels, only those given with -c
    #[arg(long)]
    pub override_channels: bool,

    /// Platform subdirectory to search (e.g. linux-64, osx-arm64)
    #[arg(long, value_name = "SUBDIR")]
    pub platform: Option<String>,

    /// Use the cached index without fetching
    #[arg(long)]
    pub use_index_cache: bool,

    /// Use locally installed package records for unreachable channels
    #[arg(long)]
    pub unknown: bool,

    /// Never access the network
    #[arg(long)]
    pub offline: bool,
}

impl ChannelArgs {
    /// Configuration overrides carried by these flags
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            channels: self.channels.clone(),
            override_channels: self.override_channels,
            subdir: self.platform.clone(),
            use_index_cache: self.use_index_cache.then_some(true),
            offline: self.offline.then_some(true),
            include_unknown: self.unknown.then_some(true),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the channels for packages matching a spec
    Search {
        /// Match spec to search for, e.g. 'numpy>=1.20' or 'conda-forge::zlib'
        #[arg(value_name = "MATCH_SPEC")]
        spec: Option<String>,

        /// Show a detail block for every matching record
        #[arg(short, long)]
        info: bool,

        /// List packages that depend on the matched name instead
        #[arg(long)]
        reverse_dependency: bool,

        #[command(flatten)]
        channels: ChannelArgs,
    },
    /// Show configuration, or details of packages
    Info {
        /// Packages to describe
        #[arg(value_name = "PACKAGES")]
        packages: Vec<String>,

        #[command(flatten)]
        channels: ChannelArgs,
    },
    /// Resolve specs into a consistent set of packages
    Solve {
        /// Specs to resolve
        #[arg(required = true, value_name = "SPEC")]
        specs: Vec<String>,

        /// Only the requested packages, without dependencies
        #[arg(long, conflicts_with = "only_deps")]
        no_deps: bool,

        /// Only the dependencies of the requested packages
        #[arg(long)]
        only_deps: bool,

        #[command(flatten)]
        channels: ChannelArgs,
    },
}

impl Commands {
    fn channel_args(&self) -> &ChannelArgs {
        match self {
            Commands::Search { channels, .. } | Commands::Info { channels, .. } | Commands::Solve { channels, .. } => {
                channels
            },
        }
    }
}

/// Dependency mode selected by `--no-deps` / `--only-deps`
pub fn deps_mode(no_deps: bool, only_deps: bool) -> DepsMode {
    match (no_deps, only_deps) {
        (true, _) => DepsMode::NoDeps,
        (false, true) => DepsMode::OnlyDeps,
        (false, false) => DepsMode::Normal,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting sprig v{}", env!("CARGO_PKG_VERSION"));

    let json = cli.json;
    let colors = cli.colors();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_failure(&error, json, colors);
            ExitCode::FAILURE
        },
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    rt.block_on(async {
        let overrides = cli.command.channel_args().overrides();
        let ctx = CommandContext::new(&overrides, cli.json, cli.colors()).await?;
        commands::dispatch_command(cli.command, &ctx).await?;
        Ok(())
    })
}

fn report_failure(error: &anyhow::Error, json: bool, colors: ColorSupport) {
    let sprig_error = error.downcast_ref::<sprig_core::SprigError>();

    if json {
        let report = match sprig_error {
            Some(e) => FailureReport::from_error(e),
            None => FailureReport::from_message(format!("{:#}", error)),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize failure report: {}", e),
        }
        return;
    }

    let formatter = ErrorFormatter::with_colors(colors);
    match sprig_error {
        Some(e) => eprintln!("{}", formatter.format_error(e)),
        None => eprintln!("{}", formatter.format_simple(&format!("{:#}", error))),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_filter = format!(
        "sprig={level},sprig_core={level},sprig_channel={level},sprig_config={level},sprig_resolver={level}"
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("sprig encountered an unexpected error: {}", panic_info);
        eprintln!("sprig crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/sprig-pm/sprig/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
