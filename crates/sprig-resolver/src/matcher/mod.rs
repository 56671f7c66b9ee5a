//! Spec matching and candidate ranking
//!
//! Matching itself lives on [`MatchSpec`]; this module applies it to an
//! [`Index`] and orders the results.

use std::cmp::{Ordering, Reverse};
use std::sync::Arc;

use sprig_channel::{ChannelPriorityMap, Index};
use sprig_core::{MatchSpec, PackageRecord};

/// Check whether `record` satisfies every constrained field of `spec`
pub fn matches(spec: &MatchSpec, record: &PackageRecord) -> bool {
    spec.matches(record)
}

/// All records matching `spec`, in index insertion order
pub fn select_candidates(spec: &MatchSpec, index: &Index) -> Vec<Arc<PackageRecord>> {
    match spec.exact_name() {
        Some(name) => index
            .named(name)
            .filter(|(_, record)| spec.matches(record))
            .map(|(_, record)| record.clone())
            .collect(),
        None => index
            .iter()
            .filter(|(_, record)| spec.matches(record))
            .map(|(_, record)| record.clone())
            .collect(),
    }
}

/// Records matching `spec`, sorted by name, version and build for display
pub fn search(spec: &MatchSpec, index: &Index) -> Vec<Arc<PackageRecord>> {
    let mut records = select_candidates(spec, index);
    records.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.version.cmp(&b.version))
            .then_with(|| a.build.cmp(&b.build))
    });
    records
}

/// Records that depend on a package whose name matches `spec`
pub fn reverse_dependencies(spec: &MatchSpec, index: &Index) -> Vec<Arc<PackageRecord>> {
    let mut records: Vec<_> = index
        .iter()
        .filter(|(_, record)| {
            record.depends.iter().any(|dep| {
                MatchSpec::parse(dep)
                    .ok()
                    .and_then(|dep| dep.exact_name().map(|name| spec.name.matches(name)))
                    .unwrap_or(false)
            })
        })
        .map(|(_, record)| record.clone())
        .collect();
    records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
    records
}

/// Preference order between candidates for the same package name.
///
/// Lower channel rank first, then higher version, then higher build number,
/// then earlier insertion into the index.
#[derive(Debug, Clone, Copy)]
pub struct CandidateOrdering<'a> {
    priority: &'a ChannelPriorityMap,
    index: &'a Index,
}

impl<'a> CandidateOrdering<'a> {
    pub fn new(priority: &'a ChannelPriorityMap, index: &'a Index) -> Self {
        Self { priority, index }
    }

    fn sort_key<'r>(&self, record: &'r PackageRecord) -> (usize, Reverse<&'r sprig_core::OrderedVersion>, Reverse<u64>, usize) {
        (
            self.priority.rank(&record.channel),
            Reverse(&record.version),
            Reverse(record.build_number),
            self.index.sequence(&record.key()).unwrap_or(usize::MAX),
        )
    }

    /// Compare two candidates; `Less` means `a` is preferred
    pub fn compare(&self, a: &PackageRecord, b: &PackageRecord) -> Ordering {
        self.sort_key(a).cmp(&self.sort_key(b))
    }

    /// Sort candidates from most to least preferred
    pub fn sort(&self, candidates: &mut [Arc<PackageRecord>]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}
