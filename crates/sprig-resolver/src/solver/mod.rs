//! Backtracking dependency resolver
//!
//! Requirements accumulate per package name. The resolver repeatedly picks
//! the oldest required name without a record, tries its candidates in
//! preference order, and after each commitment checks that every affected
//! name still has a candidate. A dead end undoes the most recent decision.
//!
//! Everything iterated here is ordered, so the same index, priority map and
//! request always produce the same resolution or the same failure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sprig_channel::{ChannelPriorityMap, Index, LoadedIndex};
use sprig_core::error::{Conflict, SprigError};
use sprig_core::{MatchSpec, PackageRecord};
use tracing::{debug, info, info_span};

use crate::graph::DependencyGraph;
use crate::matcher::CandidateOrdering;
use crate::ResolverResult;

const ROOT_ORIGIN: &str = "root";
const PINNED_ORIGIN: &str = "pinned";

/// Which part of the solved closure to return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepsMode {
    /// The full closure
    #[default]
    Normal,
    /// Only records for the requested specs
    NoDeps,
    /// The closure without requested records nothing else depends on
    OnlyDeps,
}

/// Cooperative cancellation flag shared with a running resolution
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Options for one resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub deps_mode: DepsMode,
    /// Constraints applied to every resolution; they never pull a package in
    pub pinned: Vec<MatchSpec>,
    pub cancellation: Cancellation,
}

/// A successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Records in dependency order
    pub records: Vec<Arc<PackageRecord>>,
    /// Root specs as requested
    pub specs: Vec<String>,
    /// Number of search steps taken
    pub steps: usize,
    /// Resolution time in milliseconds
    pub resolution_time_ms: u64,
}

#[derive(Debug, Clone)]
struct Requirement {
    spec: Arc<MatchSpec>,
    origin: String,
    /// `depends` requirements pull the package in, `constrains` do not
    pulls: bool,
}

#[derive(Debug, Clone, Default)]
struct State {
    requirements: BTreeMap<String, Vec<Requirement>>,
    /// Required names in the order they were first required
    frontier: Vec<String>,
    assigned: BTreeMap<String, Arc<PackageRecord>>,
}

impl State {
    fn require(&mut self, spec: MatchSpec, origin: &str, pulls: bool) -> Option<String> {
        let name = spec.exact_name()?.to_string();
        let entry = self.requirements.entry(name.clone()).or_default();
        let was_required = entry.iter().any(|r| r.pulls);
        entry.push(Requirement {
            spec: Arc::new(spec),
            origin: origin.to_string(),
            pulls,
        });
        if pulls && !was_required {
            self.frontier.push(name.clone());
        }
        Some(name)
    }

    fn requirements_on(&self, name: &str) -> &[Requirement] {
        self.requirements.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_required(&self, name: &str) -> bool {
        self.requirements_on(name).iter().any(|r| r.pulls)
    }

    fn next_undecided(&self) -> Option<String> {
        self.frontier
            .iter()
            .find(|name| !self.assigned.contains_key(*name))
            .cloned()
    }
}

struct Decision {
    name: String,
    before: State,
    candidates: Vec<Arc<PackageRecord>>,
    next: usize,
}

enum Outcome {
    Solved(BTreeMap<String, Arc<PackageRecord>>),
    Exhausted(ConflictLog),
}

/// Conflicts seen at the deepest point the search reached
#[derive(Debug, Default)]
struct ConflictLog {
    depth: Option<usize>,
    conflicts: BTreeMap<String, Conflict>,
}

impl ConflictLog {
    fn record(&mut self, depth: usize, name: &str, requirements: &[Requirement]) {
        if self.depth.map_or(true, |deepest| depth > deepest) {
            self.depth = Some(depth);
            self.conflicts.clear();
        }
        if self.depth == Some(depth) {
            self.conflicts.entry(name.to_string()).or_insert_with(|| Conflict {
                package: name.to_string(),
                requirements: requirements
                    .iter()
                    .map(|r| (r.spec.to_string(), r.origin.clone()))
                    .collect(),
            });
        }
    }
}

/// Resolves root specs against one index
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a Index,
    priority: &'a ChannelPriorityMap,
    ordering: CandidateOrdering<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a Index, priority: &'a ChannelPriorityMap) -> Self {
        Self {
            index,
            priority,
            ordering: CandidateOrdering::new(priority, index),
        }
    }

    /// Resolver over the result of an index load
    pub fn from_loaded(loaded: &'a LoadedIndex) -> Self {
        Self::new(&loaded.index, &loaded.priority)
    }

    /// Resolve `specs` into one record per required package name.
    ///
    /// Fails with [`SprigError::PackagesNotFound`] as soon as a root or
    /// dependency names a package absent from every searched channel, and
    /// with [`SprigError::Unsatisfiable`] when the search space is exhausted.
    pub fn resolve(&self, specs: &[MatchSpec], options: &ResolveOptions) -> ResolverResult<Resolution> {
        let span = info_span!("solve", specs = specs.len());
        let _guard = span.enter();
        let start = Instant::now();

        self.check_roots(specs)?;

        let mut steps = 0;
        let assigned = match self.search(specs, options, &mut steps)? {
            Outcome::Solved(assigned) => assigned,
            Outcome::Exhausted(log) => {
                debug!("Search exhausted after {} steps", steps);
                let unsatisfied = self.unsatisfiable_roots(specs, options)?;
                return Err(SprigError::Unsatisfiable {
                    specs: unsatisfied,
                    conflicts: log.conflicts.into_values().collect(),
                    channels: self.channels(),
                });
            },
        };

        let solved: Vec<Arc<PackageRecord>> = assigned.into_values().collect();
        let selected = select_for_mode(solved, specs, options.deps_mode);
        let records = DependencyGraph::from_records(&selected).dependency_order();

        info!("Resolved {} packages in {} steps", records.len(), steps);
        Ok(Resolution {
            records,
            specs: specs.iter().map(ToString::to_string).collect(),
            steps,
            resolution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn channels(&self) -> Vec<String> {
        self.priority.channels().map(str::to_string).collect()
    }

    /// Whether any record carries the spec's name from the channel and subdir it asks for
    fn is_present(&self, spec: &MatchSpec, name: &str) -> bool {
        self.index.named(name).any(|(_, record)| spec.matches_origin(record))
    }

    fn check_roots(&self, specs: &[MatchSpec]) -> ResolverResult<()> {
        let mut missing = Vec::new();
        for spec in specs {
            let Some(name) = spec.exact_name() else {
                return Err(SprigError::InvalidSpec {
                    spec: spec.to_string(),
                    token: spec.name.to_string(),
                });
            };
            if !self.is_present(spec, name) {
                missing.push(spec.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SprigError::PackagesNotFound {
                specs: missing,
                channels: self.channels(),
            })
        }
    }

    fn candidates(&self, name: &str, state: &State) -> Vec<Arc<PackageRecord>> {
        let requirements = state.requirements_on(name);
        let mut candidates: Vec<_> = self
            .index
            .named(name)
            .filter(|(_, record)| requirements.iter().all(|r| r.spec.matches(record)))
            .map(|(_, record)| record.clone())
            .collect();
        self.ordering.sort(&mut candidates);
        candidates
    }

    fn search(&self, roots: &[MatchSpec], options: &ResolveOptions, steps: &mut usize) -> ResolverResult<Outcome> {
        let mut log = ConflictLog::default();
        let mut state = State::default();
        for spec in roots {
            state.require(spec.clone(), ROOT_ORIGIN, true);
        }
        for spec in &options.pinned {
            if state.require(spec.clone(), PINNED_ORIGIN, false).is_none() {
                debug!("Ignoring pinned spec without an exact name: {}", spec);
            }
        }

        let names: Vec<String> = state.requirements.keys().cloned().collect();
        if !self.forward_check(&state, &names, &mut log) {
            return Ok(Outcome::Exhausted(log));
        }

        let mut stack: Vec<Decision> = Vec::new();
        loop {
            if options.cancellation.is_cancelled() {
                return Err(SprigError::Cancelled);
            }
            *steps += 1;

            let Some(name) = state.next_undecided() else {
                return Ok(Outcome::Solved(state.assigned));
            };
            let candidates = self.candidates(&name, &state);
            debug!("Deciding {} ({} candidates)", name, candidates.len());
            if candidates.is_empty() {
                log.record(state.assigned.len(), &name, state.requirements_on(&name));
            }
            stack.push(Decision {
                name,
                before: state,
                candidates,
                next: 0,
            });

            match self.advance(&mut stack, options, &mut log)? {
                Some(next) => state = next,
                None => return Ok(Outcome::Exhausted(log)),
            }
        }
    }

    /// Commit the next untried candidate of the most recent decision,
    /// unwinding decisions that have none left
    fn advance(
        &self,
        stack: &mut Vec<Decision>,
        options: &ResolveOptions,
        log: &mut ConflictLog,
    ) -> ResolverResult<Option<State>> {
        while let Some(decision) = stack.last_mut() {
            while decision.next < decision.candidates.len() {
                if options.cancellation.is_cancelled() {
                    return Err(SprigError::Cancelled);
                }
                let candidate = decision.candidates[decision.next].clone();
                decision.next += 1;

                let mut state = decision.before.clone();
                if self.commit(&mut state, &decision.name, candidate, log)? {
                    return Ok(Some(state));
                }
            }
            if let Some(exhausted) = stack.pop() {
                debug!("Backtracking from {}", exhausted.name);
            }
        }
        Ok(None)
    }

    /// Assign `record` to `name` and add its requirements.
    /// Returns `false` when that leaves some name without a candidate.
    fn commit(
        &self,
        state: &mut State,
        name: &str,
        record: Arc<PackageRecord>,
        log: &mut ConflictLog,
    ) -> ResolverResult<bool> {
        let (depends, constrains) = match (record.depends_specs(), record.constrains_specs()) {
            (Ok(depends), Ok(constrains)) => (depends, constrains),
            (Err(e), _) | (_, Err(e)) => {
                debug!("Skipping {} with unreadable requirements: {}", record, e);
                return Ok(false);
            },
        };

        let origin = record.to_string();
        state.assigned.insert(name.to_string(), record);

        let mut touched = Vec::with_capacity(depends.len() + constrains.len());
        for spec in depends {
            let Some(dep_name) = spec.exact_name().map(str::to_string) else {
                debug!("Ignoring dependency without an exact name: {}", spec);
                continue;
            };
            if !self.is_present(&spec, &dep_name) {
                return Err(SprigError::PackagesNotFound {
                    specs: vec![spec.to_string()],
                    channels: self.channels(),
                });
            }
            state.require(spec, &origin, true);
            touched.push(dep_name);
        }
        for spec in constrains {
            if let Some(constrained) = state.require(spec, &origin, false) {
                touched.push(constrained);
            }
        }

        Ok(self.forward_check(state, &touched, log))
    }

    /// Check that every name in `names` is still satisfiable in `state`
    fn forward_check(&self, state: &State, names: &[String], log: &mut ConflictLog) -> bool {
        let depth = state.assigned.len();
        for name in names {
            let requirements = state.requirements_on(name);
            let ok = match state.assigned.get(name) {
                Some(record) => requirements.iter().all(|r| r.spec.matches(record)),
                None if state.is_required(name) => !self.candidates(name, state).is_empty(),
                None => true,
            };
            if !ok {
                debug!("No candidate left for {}", name);
                log.record(depth, name, requirements);
                return false;
            }
        }
        true
    }

    fn satisfiable(&self, roots: &[MatchSpec], options: &ResolveOptions) -> ResolverResult<bool> {
        let mut steps = 0;
        match self.search(roots, options, &mut steps) {
            Ok(Outcome::Solved(_)) => Ok(true),
            Ok(Outcome::Exhausted(_)) => Ok(false),
            Err(SprigError::Cancelled) => Err(SprigError::Cancelled),
            Err(_) => Ok(false),
        }
    }

    /// Roots unsatisfiable on their own, plus a minimal conflicting subset
    /// of the rest found by deletion filtering
    fn unsatisfiable_roots(&self, roots: &[MatchSpec], options: &ResolveOptions) -> ResolverResult<Vec<String>> {
        let pick = |indices: &[usize]| -> Vec<MatchSpec> { indices.iter().map(|&i| roots[i].clone()).collect() };

        let mut alone = Vec::new();
        let mut rest = Vec::new();
        for (i, root) in roots.iter().enumerate() {
            if self.satisfiable(std::slice::from_ref(root), options)? {
                rest.push(i);
            } else {
                alone.push(i);
            }
        }

        let mut minimal = Vec::new();
        if !self.satisfiable(&pick(&rest), options)? {
            let mut kept = rest.clone();
            for &i in &rest {
                let trial: Vec<usize> = kept.iter().copied().filter(|&j| j != i).collect();
                if !self.satisfiable(&pick(&trial), options)? {
                    kept = trial;
                }
            }
            minimal = kept;
        }

        let mut indices: Vec<usize> = alone.into_iter().chain(minimal).collect();
        indices.sort_unstable();
        if indices.is_empty() {
            indices = (0..roots.len()).collect();
        }
        Ok(indices.into_iter().map(|i| roots[i].to_string()).collect())
    }
}

fn select_for_mode(solved: Vec<Arc<PackageRecord>>, roots: &[MatchSpec], mode: DepsMode) -> Vec<Arc<PackageRecord>> {
    let is_root = |record: &PackageRecord| roots.iter().any(|spec| spec.matches(record));
    match mode {
        DepsMode::Normal => solved,
        DepsMode::NoDeps => solved.into_iter().filter(|r| is_root(r)).collect(),
        DepsMode::OnlyDeps => {
            let graph = DependencyGraph::from_records(&solved);
            solved
                .into_iter()
                .filter(|r| !is_root(r) || !graph.dependents(&r.name).is_empty())
                .collect()
        },
    }
}

#[cfg(test)]
mod tests;
