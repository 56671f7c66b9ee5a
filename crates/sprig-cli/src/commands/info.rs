//! `sprig info` command implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sprig_channel::{CacheStats, ChannelCache};
use sprig_core::{MatchSpec, PackageRecord, SprigResult};
use sprig_resolver::search;

use super::search::{not_found, render_details, to_json};
use super::CommandContext;
use crate::report::RecordReport;

/// Summary of the tool and its configuration
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub sprig_version: String,
    pub build_date: String,
    pub rust_version: String,
    pub platform: String,
    pub channels: Vec<String>,
    pub cache_dir: String,
    pub cache: CacheStats,
    pub pkgs_dirs: Vec<String>,
    pub config_files: Vec<String>,
    pub offline: bool,
    pub use_index_cache: bool,
}

/// Execute the `sprig info` command
pub async fn execute(packages: &[String], ctx: &CommandContext) -> SprigResult<()> {
    if packages.is_empty() {
        let report = info_report(ctx).await?;
        let text = if ctx.json { to_json(&report)? } else { render_info(&report) };
        ctx.output.print(&text);
        return Ok(());
    }

    let described = describe(packages, ctx).await?;
    if ctx.json {
        let reports: BTreeMap<&String, Vec<RecordReport>> = described
            .iter()
            .map(|(spec, records)| (spec, records.iter().map(|r| RecordReport::from(r.as_ref())).collect()))
            .collect();
        ctx.output.print(&to_json(&reports)?);
    } else {
        for records in described.values() {
            for record in records {
                ctx.output.print(&render_details(record));
                ctx.output.print("");
            }
        }
    }
    Ok(())
}

/// Tool summary from the active settings
pub async fn info_report(ctx: &CommandContext) -> SprigResult<InfoReport> {
    let settings = &ctx.settings;
    let channels = settings.parsed_channels()?;
    let cache = ChannelCache::new(settings.cache_dir.clone());
    let stats = cache.stats().await;

    Ok(InfoReport {
        sprig_version: env!("CARGO_PKG_VERSION").to_string(),
        build_date: env!("BUILD_DATE").to_string(),
        rust_version: env!("RUSTC_VERSION").to_string(),
        platform: settings.subdir.clone(),
        channels: channels.iter().map(|c| c.url().to_string()).collect(),
        cache_dir: cache.dir().to_string(),
        cache: stats,
        pkgs_dirs: settings.pkgs_dirs.iter().map(|d| d.to_string()).collect(),
        config_files: settings.config_files().iter().map(|p| p.to_string()).collect(),
        offline: settings.offline,
        use_index_cache: settings.use_index_cache,
    })
}

fn render_info(report: &InfoReport) -> String {
    let param = |name: &str, value: &str| format!("{:>20} : {}", name, value);
    let multi = |values: &[String]| {
        if values.is_empty() {
            "(none)".to_string()
        } else {
            values.join(format!("\n{}", " ".repeat(23)).as_str())
        }
    };

    [
        String::new(),
        param("sprig version", &report.sprig_version),
        param("build date", &report.build_date),
        param("rust version", &report.rust_version),
        param("platform", &report.platform),
        param("channel URLs", &multi(&report.channels)),
        param("index cache", &report.cache_dir),
        param("cached indexes", &describe_cache(&report.cache)),
        param("package cache", &multi(&report.pkgs_dirs)),
        param("config files", &multi(&report.config_files)),
        param("offline mode", &report.offline.to_string()),
        String::new(),
    ]
    .join("\n")
}

fn describe_cache(stats: &CacheStats) -> String {
    let mut text = format!("{} ({} records)", stats.total_entries, stats.total_records);
    if stats.corrupt_entries > 0 {
        text.push_str(&format!(", {} unreadable", stats.corrupt_entries));
    }
    if let Some(oldest) = stats.oldest_fetch {
        text.push_str(&format!(", oldest fetched {}", oldest.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    text
}

/// Every record matching each package spec, keyed by the spec as given
pub async fn describe(packages: &[String], ctx: &CommandContext) -> SprigResult<BTreeMap<String, Vec<Arc<PackageRecord>>>> {
    let specs = packages
        .iter()
        .map(|p| MatchSpec::parse(p).map(|spec| (p.clone(), spec)))
        .collect::<SprigResult<Vec<_>>>()?;

    let channels = ctx.settings.parsed_channels()?;
    let loaded = ctx.load_index(&channels, &ctx.settings.subdir).await?;

    let mut described = BTreeMap::new();
    let mut missing = Vec::new();
    for (text, spec) in specs {
        let records = search(&spec, &loaded.index);
        if records.is_empty() {
            missing.push(spec.to_string());
        } else {
            described.insert(text, records);
        }
    }

    if !missing.is_empty() {
        return Err(not_found(missing, &loaded));
    }
    Ok(described)
}
