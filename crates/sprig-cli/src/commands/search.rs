//! `sprig search` command implementation.
//!
//! Also holds the record renderers shared with `info` and `solve`.

use std::collections::BTreeMap;
use std::sync::Arc;

use sprig_channel::{Channel, LoadedIndex};
use sprig_core::{MatchSpec, PackageRecord, SprigError, SprigResult};
use sprig_resolver::{reverse_dependencies, search};

use super::{suggest_similar, CommandContext};
use crate::report::RecordReport;

/// Arguments of `sprig search`
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub spec: Option<String>,
    pub info: bool,
    pub reverse_dependency: bool,
}

/// Matching records and the channels they were searched in
pub struct SearchResults {
    pub records: Vec<Arc<PackageRecord>>,
    pub channels: Vec<Channel>,
}

/// Execute the `sprig search` command
pub async fn execute(args: &SearchArgs, ctx: &CommandContext) -> SprigResult<()> {
    let results = find(args, ctx).await?;

    if ctx.json {
        ctx.output.print(&to_json(&group_by_name(&results.records))?);
    } else if args.info {
        for record in &results.records {
            ctx.output.print(&render_details(record));
            ctx.output.print("");
        }
    } else {
        ctx.output.print(&render_table(&results.records, &results.channels));
    }
    Ok(())
}

/// Load the index and collect records matching the search
pub async fn find(args: &SearchArgs, ctx: &CommandContext) -> SprigResult<SearchResults> {
    let spec = MatchSpec::parse(args.spec.as_deref().unwrap_or("*"))?;
    let settings = &ctx.settings;

    // an exact channel or subdir in the spec narrows what is loaded
    let channels = match spec.get_exact_value("channel") {
        Some(channel) => vec![Channel::parse(&channel, &settings.channel_alias)?],
        None => settings.parsed_channels()?,
    };
    let platform = spec
        .get_exact_value("subdir")
        .unwrap_or_else(|| settings.subdir.clone());

    let loaded = ctx.load_index(&channels, &platform).await?;
    let records = if args.reverse_dependency {
        reverse_dependencies(&spec, &loaded.index)
    } else {
        search(&spec, &loaded.index)
    };

    if records.is_empty() {
        if let Some(suggestion) = spec.exact_name().and_then(|name| suggest_similar(name, loaded.index.names())) {
            ctx.output.info(&format!("Did you mean '{}'?", suggestion));
        }
        return Err(not_found(vec![spec.to_string()], &loaded));
    }

    Ok(SearchResults { records, channels })
}

pub(crate) fn not_found(specs: Vec<String>, loaded: &LoadedIndex) -> SprigError {
    SprigError::PackagesNotFound {
        specs,
        channels: loaded.priority.channels().map(str::to_string).collect(),
    }
}

/// Records grouped by package name, for JSON output
pub fn group_by_name(records: &[Arc<PackageRecord>]) -> BTreeMap<String, Vec<RecordReport>> {
    let mut grouped: BTreeMap<String, Vec<RecordReport>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.name.clone())
            .or_default()
            .push(RecordReport::from(record.as_ref()));
    }
    grouped
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> SprigResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SprigError::Json { message: e.to_string() })
}

/// `Name Version Build Channel` table
pub fn render_table(records: &[Arc<PackageRecord>], channels: &[Channel]) -> String {
    let row = |name: &str, version: &str, build: &str, channel: &str| {
        format!("{:<25}  {:<15} {:>15}  {}", name, version, build, channel)
    };

    let mut lines = vec![row("# Name", "Version", "Build", "Channel")];
    for record in records {
        lines.push(row(
            &record.name,
            &record.version.to_string(),
            &record.build,
            channel_label(&record.channel, channels),
        ));
    }
    lines.join("\n")
}

/// Short name of the channel a record came from
fn channel_label<'a>(url: &'a str, channels: &'a [Channel]) -> &'a str {
    channels
        .iter()
        .find(|channel| channel.url() == url)
        .map_or(url, |channel| channel.name())
}

/// Detail block for one record
pub fn render_details(record: &PackageRecord) -> String {
    let title = format!("{} {} {}", record.name, record.version, record.build);
    let mut lines = vec![title.clone(), "-".repeat(title.len())];

    let mut push = |label: &str, value: String| lines.push(format!("{:<12}: {}", label, value));
    push("file name", record.file_name());
    push("name", record.name.clone());
    push("version", record.version.to_string());
    push("build string", record.build.clone());
    push("build number", record.build_number.to_string());
    push("size", human_bytes(record.size));
    if let Some(license) = record.extra.get("license").and_then(|v| v.as_str()) {
        push("license", license.to_string());
    }
    push("subdir", record.subdir.clone());
    push("url", record.url());
    if let Some(md5) = record.extra.get("md5").and_then(|v| v.as_str()) {
        push("md5", md5.to_string());
    }
    if !record.constrains.is_empty() {
        push("constrains", dash_list(&record.constrains));
    }
    push("dependencies", dash_list(&record.depends));

    lines.join("\n")
}

fn dash_list(items: &[String]) -> String {
    items.iter().map(|item| format!("\n  - {}", item)).collect()
}

/// Human readable size
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < KB * KB {
        format!("{:.0} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:.1} MB", size / (KB * KB))
    } else {
        format!("{:.2} GB", size / (KB * KB * KB))
    }
}
