//! Unit tests for the resolver

use super::*;
use sprig_core::OrderedVersion;

const MAIN: &str = "https://conda.example.org/main";
const FORGE: &str = "https://conda.example.org/forge";

fn rec(name: &str, version: &str, depends: &[&str]) -> PackageRecord {
    rec_in(MAIN, name, version, 0, depends)
}

fn rec_in(channel: &str, name: &str, version: &str, build_number: u64, depends: &[&str]) -> PackageRecord {
    let mut record = PackageRecord::new(name, OrderedVersion::parse(version).unwrap(), &format!("h{}_{}", name.len(), build_number));
    record.build_number = build_number;
    record.channel = channel.to_string();
    record.subdir = "linux-64".to_string();
    record.depends = depends.iter().map(|d| d.to_string()).collect();
    record
}

fn specs(texts: &[&str]) -> Vec<MatchSpec> {
    texts.iter().map(|t| MatchSpec::parse(t).unwrap()).collect()
}

fn solve_with(
    records: Vec<PackageRecord>,
    channels: &[&str],
    roots: &[&str],
    options: &ResolveOptions,
) -> ResolverResult<Resolution> {
    let index = Index::from_records(records);
    let priority = ChannelPriorityMap::prioritize(channels);
    Resolver::new(&index, &priority).resolve(&specs(roots), options)
}

fn solve(records: Vec<PackageRecord>, roots: &[&str]) -> ResolverResult<Resolution> {
    solve_with(records, &[MAIN], roots, &ResolveOptions::default())
}

fn installed(resolution: &Resolution) -> Vec<String> {
    resolution
        .records
        .iter()
        .map(|r| format!("{}-{}", r.name, r.version))
        .collect()
}

fn chain() -> Vec<PackageRecord> {
    vec![
        rec("app", "1.0", &["lib >=1.0"]),
        rec("lib", "1.0", &["zlib"]),
        rec("lib", "2.0", &["zlib >=1.2"]),
        rec("zlib", "1.1", &[]),
        rec("zlib", "1.2.13", &[]),
    ]
}

#[test]
fn test_resolves_closure_in_dependency_order() {
    let resolution = solve(chain(), &["app"]).unwrap();
    assert_eq!(installed(&resolution), vec!["zlib-1.2.13", "lib-2.0", "app-1.0"]);
    assert_eq!(resolution.specs, vec!["app".to_string()]);
    assert!(resolution.steps >= 3);
}

#[test]
fn test_prefers_higher_build_number() {
    let records = vec![
        rec_in(MAIN, "pkg", "1.0", 1, &[]),
        rec_in(MAIN, "pkg", "1.0", 4, &[]),
        rec_in(MAIN, "pkg", "1.0", 2, &[]),
    ];
    let resolution = solve(records, &["pkg"]).unwrap();
    assert_eq!(resolution.records[0].build_number, 4);
}

#[test]
fn test_channel_priority_beats_version() {
    let records = vec![rec_in(MAIN, "pkg", "1.0", 0, &[]), rec_in(FORGE, "pkg", "2.0", 0, &[])];

    let resolution = solve_with(records.clone(), &[MAIN, FORGE], &["pkg"], &ResolveOptions::default()).unwrap();
    assert_eq!(resolution.records[0].channel, MAIN);
    assert_eq!(resolution.records[0].version.as_str(), "1.0");

    let resolution = solve_with(records.clone(), &[FORGE, MAIN], &["pkg"], &ResolveOptions::default()).unwrap();
    assert_eq!(resolution.records[0].channel, FORGE);

    // an explicit channel overrides priority
    let resolution = solve_with(records, &[MAIN, FORGE], &["forge::pkg"], &ResolveOptions::default()).unwrap();
    assert_eq!(resolution.records[0].version.as_str(), "2.0");
}

#[test]
fn test_backtracks_to_earlier_decision() {
    let records = vec![
        rec("app", "2.0", &["zlib 2.*"]),
        rec("app", "1.0", &["zlib 1.*"]),
        rec("tool", "1.0", &["zlib 1.*"]),
        rec("zlib", "2.0", &[]),
        rec("zlib", "1.3", &[]),
    ];
    let resolution = solve(records, &["app", "tool"]).unwrap();
    assert_eq!(resolution.records.len(), 3);
    let mut names = installed(&resolution);
    names.sort();
    assert_eq!(names, vec!["app-1.0", "tool-1.0", "zlib-1.3"]);
}

#[test]
fn test_constrains_narrow_without_pulling() {
    let mut app = rec("app", "1.0", &["lib"]);
    app.constrains = vec!["zlib <1.2".to_string(), "openssl >=3".to_string()];
    let records = vec![app, rec("lib", "1.0", &["zlib"]), rec("zlib", "1.1", &[]), rec("zlib", "1.2.13", &[])];

    let resolution = solve(records, &["app"]).unwrap();
    assert_eq!(installed(&resolution), vec!["zlib-1.1", "lib-1.0", "app-1.0"]);
}

#[test]
fn test_conflicting_roots_name_both_specs() {
    let error = solve(vec![rec("a", "1.5", &[])], &["a>=2.0", "a<1.0"]).unwrap_err();

    match error {
        SprigError::Unsatisfiable { specs, conflicts, channels } => {
            assert_eq!(specs, vec!["a>=2.0".to_string(), "a<1.0".to_string()]);
            assert_eq!(channels, vec![MAIN.to_string()]);
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].package, "a");
            assert_eq!(
                conflicts[0].requirements,
                vec![
                    ("a>=2.0".to_string(), "root".to_string()),
                    ("a<1.0".to_string(), "root".to_string()),
                ]
            );
        },
        other => panic!("expected Unsatisfiable, got {:?}", other),
    }
}

#[test]
fn test_unsatisfiable_reports_minimal_subset() {
    let records = vec![
        rec("x", "1.0", &[]),
        rec("a", "1.0", &["c 1.*"]),
        rec("b", "1.0", &["c 2.*"]),
        rec("c", "1.0", &[]),
        rec("c", "2.0", &[]),
    ];
    let error = solve(records, &["x", "a>=1.0", "b"]).unwrap_err();

    assert_eq!(error.kind(), "UnsatisfiableError");
    assert_eq!(error.unsatisfied_specs(), &["a>=1.0".to_string(), "b".to_string()]);
    match error {
        SprigError::Unsatisfiable { conflicts, .. } => {
            assert_eq!(conflicts[0].package, "c");
            assert_eq!(conflicts[0].requirements.len(), 2);
        },
        other => panic!("expected Unsatisfiable, got {:?}", other),
    }
}

#[test]
fn test_missing_root_is_not_found() {
    let error = solve(chain(), &["app", "ghost-package"]).unwrap_err();
    match error {
        SprigError::PackagesNotFound { specs, channels } => {
            assert_eq!(specs, vec!["ghost-package".to_string()]);
            assert_eq!(channels, vec![MAIN.to_string()]);
        },
        other => panic!("expected PackagesNotFound, got {:?}", other),
    }
}

#[test]
fn test_missing_dependency_is_not_found() {
    let records = vec![rec("app", "1.0", &["missing-lib >=2"])];
    let error = solve(records, &["app"]).unwrap_err();
    assert_eq!(error.kind(), "PackagesNotFoundError");
    assert_eq!(error.unsatisfied_specs(), &["missing-lib>=2".to_string()]);
}

#[test]
fn test_root_from_wrong_channel_is_not_found() {
    let error = solve(chain(), &["forge::zlib"]).unwrap_err();
    assert!(matches!(error, SprigError::PackagesNotFound { .. }));
}

#[test]
fn test_glob_root_is_rejected() {
    let error = solve(chain(), &["zl*"]).unwrap_err();
    match error {
        SprigError::InvalidSpec { token, .. } => assert_eq!(token, "zl*"),
        other => panic!("expected InvalidSpec, got {:?}", other),
    }
}

#[test]
fn test_pinned_specs_constrain_but_never_pull() {
    let options = ResolveOptions {
        pinned: specs(&["lib 1.*", "python 3.11.*"]),
        ..ResolveOptions::default()
    };
    let resolution = solve_with(chain(), &[MAIN], &["app"], &options).unwrap();
    assert_eq!(installed(&resolution), vec!["zlib-1.2.13", "lib-1.0", "app-1.0"]);

    let options = ResolveOptions {
        pinned: specs(&["lib <1.0"]),
        ..ResolveOptions::default()
    };
    let error = solve_with(chain(), &[MAIN], &["app"], &options).unwrap_err();
    assert_eq!(error.unsatisfied_specs(), &["app".to_string()]);
}

#[test]
fn test_deps_modes() {
    let no_deps = ResolveOptions {
        deps_mode: DepsMode::NoDeps,
        ..ResolveOptions::default()
    };
    let resolution = solve_with(chain(), &[MAIN], &["app"], &no_deps).unwrap();
    assert_eq!(installed(&resolution), vec!["app-1.0"]);

    let only_deps = ResolveOptions {
        deps_mode: DepsMode::OnlyDeps,
        ..ResolveOptions::default()
    };
    let resolution = solve_with(chain(), &[MAIN], &["app"], &only_deps).unwrap();
    assert_eq!(installed(&resolution), vec!["zlib-1.2.13", "lib-2.0"]);

    // a requested package something else needs stays
    let resolution = solve_with(chain(), &[MAIN], &["app", "lib"], &only_deps).unwrap();
    assert_eq!(installed(&resolution), vec!["zlib-1.2.13", "lib-2.0"]);
}

#[test]
fn test_cancelled_resolution() {
    let options = ResolveOptions::default();
    options.cancellation.cancel();
    let error = solve_with(chain(), &[MAIN], &["app"], &options).unwrap_err();
    assert!(matches!(error, SprigError::Cancelled));

    let clone = Cancellation::new();
    assert!(!clone.is_cancelled());
    clone.clone().cancel();
    assert!(clone.is_cancelled());
}

/// Twenty two-way choices ahead of a conflict the forward check only sees
/// once the last package is committed, so the search backtracks through
/// every combination before giving up
fn exhaustive_conflict() -> (Vec<PackageRecord>, Vec<String>) {
    let mut records = Vec::new();
    let mut roots = Vec::new();
    for i in 0..20 {
        let name = format!("choice{}", i);
        records.push(rec(&name, "1.0", &[]));
        records.push(rec(&name, "2.0", &[]));
        roots.push(name);
    }
    records.push(rec("x", "1.0", &[]));
    records.push(rec("x", "3.0", &[]));
    records.push(rec("last", "1.0", &["x >=2"]));
    roots.push("x <2".to_string());
    roots.push("last".to_string());
    (records, roots)
}

#[test]
fn test_cancel_during_search() {
    let (records, roots) = exhaustive_conflict();
    let roots: Vec<&str> = roots.iter().map(String::as_str).collect();
    let options = ResolveOptions::default();
    let cancellation = options.cancellation.clone();

    let result = std::thread::scope(|scope| {
        scope.spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            cancellation.cancel();
        });
        solve_with(records, &[MAIN], &roots, &options)
    });

    assert!(matches!(result, Err(SprigError::Cancelled)));
    assert!(options.cancellation.is_cancelled());
}

#[test]
fn test_resolution_is_deterministic() {
    let records = vec![
        rec_in(FORGE, "pkg", "2.0", 0, &["dep"]),
        rec_in(MAIN, "pkg", "1.0", 0, &["dep"]),
        rec_in(MAIN, "dep", "1.0", 0, &[]),
        rec_in(FORGE, "dep", "1.0", 0, &[]),
    ];
    let first = solve_with(records.clone(), &[MAIN, FORGE], &["pkg"], &ResolveOptions::default()).unwrap();
    for _ in 0..5 {
        let again = solve_with(records.clone(), &[MAIN, FORGE], &["pkg"], &ResolveOptions::default()).unwrap();
        assert_eq!(
            again.records.iter().map(|r| r.key()).collect::<Vec<_>>(),
            first.records.iter().map(|r| r.key()).collect::<Vec<_>>()
        );
    }
    assert!(first.records.iter().all(|r| r.channel == MAIN));
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_records() -> impl Strategy<Value = Vec<PackageRecord>> {
        // (package, version, dependency, lower bound) for a small closed universe
        prop::collection::vec((0usize..5, 1u32..4, prop::option::of((0usize..5, 0u32..4))), 1..20).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(pkg, version, dep)| {
                    let depends: Vec<String> = dep
                        .filter(|(dep_pkg, _)| *dep_pkg != pkg)
                        .map(|(dep_pkg, min)| format!("p{} >={}", dep_pkg, min))
                        .into_iter()
                        .collect();
                    let refs: Vec<&str> = depends.iter().map(String::as_str).collect();
                    rec(&format!("p{}", pkg), &format!("{}.0", version), &refs)
                })
                .collect()
        })
    }

    fn outcome(result: ResolverResult<Resolution>) -> Result<Vec<String>, String> {
        result
            .map(|resolution| resolution.records.iter().map(|r| r.key().to_string()).collect())
            .map_err(|e| e.to_string())
    }

    proptest! {
        #[test]
        fn same_request_same_answer(records in arb_records(), root in 0usize..5) {
            let root = format!("p{}", root);
            let first = outcome(solve(records.clone(), &[root.as_str()]));
            let second = outcome(solve(records, &[root.as_str()]));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn solutions_satisfy_every_edge(records in arb_records(), root in 0usize..5) {
            let root = format!("p{}", root);
            if let Ok(resolution) = solve(records, &[root.as_str()]) {
                let by_name: BTreeMap<_, _> = resolution.records.iter().map(|r| (r.name.clone(), r.clone())).collect();
                prop_assert_eq!(by_name.len(), resolution.records.len());
                prop_assert!(by_name.contains_key(&root));
                for record in &resolution.records {
                    for dep in record.depends_specs().unwrap() {
                        let name = dep.exact_name().unwrap();
                        let solved = by_name.get(name);
                        prop_assert!(solved.map_or(false, |s| dep.matches(s)), "{} needs {}", record, dep);
                    }
                }
            }
        }
    }
}
