//! Common utilities for benchmarks

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};
use sprig_channel::{ChannelPriorityMap, Index};
use sprig_core::{OrderedVersion, PackageRecord};

/// Primary channel of synthetic indices
pub const PRIMARY_CHANNEL: &str = "https://conda.example.org/main";
/// Lower priority channel carrying a copy of every package
pub const MIRROR_CHANNEL: &str = "https://conda.example.org/mirror";

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Version strings in every form the grammar accepts
pub fn version_strings(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 5 {
            0 => format!("{}.{}.{}", i % 7, i % 13, i % 29),
            1 => format!("{}.{}", i % 11, i % 17),
            2 => format!("{}.{}.{}rc{}", i % 5, i % 9, i % 4, i % 3),
            3 => format!("{}!{}.{}.post{}", i % 2, i % 8, i % 6, i % 3),
            _ => format!("{}.{}.{}.dev{}+local{}", i % 3, i % 10, i % 7, i % 5, i % 2),
        })
        .collect()
}

/// Match spec strings covering the common syntaxes
pub fn spec_strings(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 6 {
            0 => format!("pkg{}", i),
            1 => format!("pkg{} {}.{}.*", i, i % 4, i % 9),
            2 => format!("pkg{}>={}.{},<{}", i, i % 3, i % 10, i % 3 + 1),
            3 => format!("pkg{}={}.{}=h{}_0", i, i % 5, i % 7, i),
            4 => format!("main::pkg{} >={}.0 py3*", i, i % 4),
            _ => format!("pkg{}[version='>=1.0', build_number='>=2']", i),
        })
        .collect()
}

/// Synthetic two-channel index.
///
/// Package `pkg{i}` has `versions` releases; each release depends on
/// `fanout` later packages with a lower-bound constraint, so resolving
/// `pkg0` pulls in a layered graph. The mirror channel carries the same
/// records at lower priority.
pub fn synthetic_index(packages: usize, versions: usize, fanout: usize) -> (Index, ChannelPriorityMap) {
    let mut records = Vec::with_capacity(packages * versions * 2);
    for channel in [PRIMARY_CHANNEL, MIRROR_CHANNEL] {
        for i in 0..packages {
            for v in 0..versions {
                let version = match OrderedVersion::parse(&format!("1.{}.0", v)) {
                    Ok(version) => version,
                    Err(_) => continue,
                };
                let mut record = PackageRecord::new(&format!("pkg{}", i), version, &format!("h{}_0", i));
                record.channel = channel.to_string();
                record.subdir = "linux-64".to_string();
                record.depends = (1..=fanout)
                    .map(|step| i + step)
                    .filter(|&dep| dep < packages)
                    .map(|dep| format!("pkg{} >=1.{}", dep, v / 2))
                    .collect();
                records.push(record);
            }
        }
    }

    let priority = ChannelPriorityMap::prioritize([PRIMARY_CHANNEL, MIRROR_CHANNEL]);
    (Index::from_records(records), priority)
}

/// sprig.toml content with `channels` channels and `pinned` pinned packages
pub fn sprig_toml_content(channels: usize, pinned: usize) -> String {
    let channels: Vec<String> = (0..channels).map(|i| format!("\"channel-{}\"", i)).collect();
    let pinned: Vec<String> = (0..pinned).map(|i| format!("\"pkg{} >=1.{}\"", i, i % 10)).collect();
    format!(
        "channels = [{}]\nsubdir = \"linux-64\"\nuse_index_cache = true\nmax_workers = 4\npinned_packages = [{}]\n",
        channels.join(", "),
        pinned.join(", ")
    )
}
