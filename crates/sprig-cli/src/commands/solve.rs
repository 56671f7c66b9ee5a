//! `sprig solve` command implementation.

use serde::Serialize;
use sprig_core::{MatchSpec, SprigResult};
use sprig_resolver::{Cancellation, DepsMode, Resolution, ResolveOptions, Resolver};
use tracing::warn;

use super::search::{render_table, to_json};
use super::CommandContext;
use crate::report::RecordReport;

/// A successful resolution, for JSON output
#[derive(Debug, Serialize)]
pub struct SolveReport {
    pub specs: Vec<String>,
    pub deps_mode: DepsMode,
    pub records: Vec<RecordReport>,
    pub steps: usize,
    pub resolution_time_ms: u64,
}

/// Execute the `sprig solve` command
pub async fn execute(specs: &[String], deps_mode: DepsMode, ctx: &CommandContext) -> SprigResult<()> {
    let channels = ctx.settings.parsed_channels()?;
    let resolution = resolve(specs, deps_mode, ctx).await?;

    if ctx.json {
        let report = SolveReport {
            specs: resolution.specs.clone(),
            deps_mode,
            records: resolution.records.iter().map(|r| RecordReport::from(r.as_ref())).collect(),
            steps: resolution.steps,
            resolution_time_ms: resolution.resolution_time_ms,
        };
        ctx.output.print(&to_json(&report)?);
    } else {
        ctx.output.print(&render_table(&resolution.records, &channels));
        ctx.output.success(&format!(
            "Resolved {} packages in {} ms",
            resolution.records.len(),
            resolution.resolution_time_ms
        ));
    }
    Ok(())
}

/// Load the configured channels and resolve `specs` against them
pub async fn resolve(specs: &[String], deps_mode: DepsMode, ctx: &CommandContext) -> SprigResult<Resolution> {
    let roots = specs
        .iter()
        .map(|s| MatchSpec::parse(s))
        .collect::<SprigResult<Vec<_>>>()?;
    let pinned = ctx.settings.pinned_specs()?;

    let channels = ctx.settings.parsed_channels()?;
    let loaded = ctx.load_index(&channels, &ctx.settings.subdir).await?;

    // Ctrl-C stops the search at its next step
    let cancellation = Cancellation::new();
    let on_interrupt = tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling resolution");
                cancellation.cancel();
            }
        }
    });

    let options = ResolveOptions {
        deps_mode,
        pinned,
        cancellation,
    };
    let result = Resolver::from_loaded(&loaded).resolve(&roots, &options);
    on_interrupt.abort();
    result
}
