//! Dependency resolution benchmarks
//!
//! Resolves the root of layered synthetic indices of growing size, and
//! measures the candidate ordering and install ordering on their own.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sprig_benchmarks::{criterion_config, synthetic_index};
use sprig_core::MatchSpec;
use sprig_resolver::{select_candidates, CandidateOrdering, DependencyGraph, ResolveOptions, Resolver};

/// Benchmark full resolutions for different index sizes
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for packages in [10, 100, 500].iter() {
        let (index, priority) = synthetic_index(*packages, 5, 3);
        let roots = match MatchSpec::parse("pkg0") {
            Ok(spec) => vec![spec],
            Err(_) => return,
        };
        let options = ResolveOptions::default();
        group.throughput(Throughput::Elements(*packages as u64));

        group.bench_with_input(BenchmarkId::new("packages", packages), packages, |b, _| {
            b.iter(|| {
                let resolver = Resolver::new(&index, &priority);
                black_box(resolver.resolve(&roots, &options).map(|r| r.records.len()))
            });
        });
    }

    group.finish();
}

/// Benchmark ordering the candidates of one package
fn bench_candidate_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_ordering");

    for versions in [10, 100, 1000].iter() {
        let (index, priority) = synthetic_index(1, *versions, 0);
        let spec = match MatchSpec::parse("pkg0") {
            Ok(spec) => spec,
            Err(_) => return,
        };
        let candidates = select_candidates(&spec, &index);
        group.throughput(Throughput::Elements(candidates.len() as u64));

        group.bench_with_input(BenchmarkId::new("versions", versions), &candidates, |b, candidates| {
            let ordering = CandidateOrdering::new(&priority, &index);
            b.iter(|| {
                let mut sorted = candidates.clone();
                ordering.sort(&mut sorted);
                black_box(sorted.first().cloned())
            });
        });
    }

    group.finish();
}

/// Benchmark install ordering of a solved set
fn bench_dependency_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_order");

    for packages in [100, 1000].iter() {
        let (index, priority) = synthetic_index(*packages, 1, 4);
        let roots = match MatchSpec::parse("pkg0") {
            Ok(spec) => vec![spec],
            Err(_) => return,
        };
        let records = match Resolver::new(&index, &priority).resolve(&roots, &ResolveOptions::default()) {
            Ok(resolution) => resolution.records,
            Err(_) => return,
        };

        group.bench_with_input(BenchmarkId::new("packages", packages), &records, |b, records| {
            b.iter(|| black_box(DependencyGraph::from_records(records).dependency_order().len()));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_resolution, bench_candidate_ordering, bench_dependency_order
}
criterion_main!(benches);
