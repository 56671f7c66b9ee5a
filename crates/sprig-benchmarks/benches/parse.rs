//! Grammar and configuration parsing benchmarks
//!
//! Version and match spec parsing dominate index loading and every solver
//! step, so they are measured on their own alongside `sprig.toml` parsing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sprig_benchmarks::{criterion_config, spec_strings, sprig_toml_content, synthetic_index, version_strings};
use sprig_config::toml::parse_sprig_toml;
use sprig_core::{MatchSpec, OrderedVersion};

/// Benchmark version parsing
fn bench_version_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_parsing");
    let versions = version_strings(1000);
    group.throughput(Throughput::Elements(versions.len() as u64));

    group.bench_function("parse_1000", |b| {
        b.iter(|| {
            for version in &versions {
                let _ = black_box(OrderedVersion::parse(version));
            }
        });
    });

    let mut parsed: Vec<OrderedVersion> = versions.iter().filter_map(|v| OrderedVersion::parse(v).ok()).collect();
    group.bench_function("sort_1000", |b| {
        b.iter(|| {
            parsed.sort();
            black_box(parsed.first().cloned())
        });
    });

    group.finish();
}

/// Benchmark match spec parsing
fn bench_spec_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("spec_parsing");

    for count in [10, 100, 1000].iter() {
        let specs = spec_strings(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("specs", count), &specs, |b, specs| {
            b.iter(|| {
                for spec in specs {
                    let _ = black_box(MatchSpec::parse(spec));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark matching one spec against every record of an index
fn bench_spec_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("spec_matching");
    let (index, _) = synthetic_index(200, 10, 0);
    group.throughput(Throughput::Elements(index.len() as u64));

    for text in ["pkg42", "pkg4*", "pkg42 >=1.3,<1.8", "main::pkg42[build=h42*]"] {
        let spec = match MatchSpec::parse(text) {
            Ok(spec) => spec,
            Err(_) => continue,
        };
        group.bench_with_input(BenchmarkId::new("scan", text), &spec, |b, spec| {
            b.iter(|| black_box(index.iter().filter(|(_, record)| spec.matches(record)).count()));
        });
    }

    group.finish();
}

/// Benchmark sprig.toml parsing
fn bench_sprig_toml_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprig_toml_parsing");

    for pinned in [0, 10, 100].iter() {
        let content = sprig_toml_content(5, *pinned);
        group.bench_with_input(BenchmarkId::new("pinned", pinned), &content, |b, content| {
            b.iter(|| black_box(parse_sprig_toml(content)));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_version_parsing, bench_spec_parsing, bench_spec_matching, bench_sprig_toml_parsing
}
criterion_main!(benches);
