//! Dependency graph of a resolved install set
//!
//! Nodes are the solved records, edges run from a dependency to the record
//! that depends on it, so a topological sort yields install order.

use std::collections::BTreeMap;
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use sprig_core::{MatchSpec, PackageRecord};
use tracing::debug;

/// Directed graph over one record per package name
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Dependency -> dependent edges
    graph: DiGraph<Arc<PackageRecord>, ()>,
    /// Package name to node
    nodes: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of `records`. Dependencies on names outside the set are ignored.
    pub fn from_records(records: &[Arc<PackageRecord>]) -> Self {
        let mut graph = Self::new();

        let mut sorted: Vec<_> = records.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for record in sorted {
            graph.add_package(record.clone());
        }

        let named: Vec<(NodeIndex, Arc<PackageRecord>)> = graph
            .nodes
            .values()
            .map(|&idx| (idx, graph.graph[idx].clone()))
            .collect();
        for (dependent, record) in named {
            for dep in &record.depends {
                let Some(name) = MatchSpec::parse(dep).ok().and_then(|s| s.exact_name().map(str::to_string)) else {
                    continue;
                };
                if let Some(&dependency) = graph.nodes.get(&name) {
                    if dependency != dependent {
                        graph.graph.update_edge(dependency, dependent, ());
                    }
                }
            }
        }
        graph
    }

    /// Add a record; a second record with the same name is ignored
    pub fn add_package(&mut self, record: Arc<PackageRecord>) -> NodeIndex {
        if let Some(&existing) = self.nodes.get(&record.name) {
            return existing;
        }
        let name = record.name.clone();
        let index = self.graph.add_node(record);
        self.nodes.insert(name, index);
        index
    }

    /// Record for a package name
    pub fn get_package(&self, name: &str) -> Option<&Arc<PackageRecord>> {
        self.nodes.get(name).map(|&idx| &self.graph[idx])
    }

    /// Names of records that depend directly on `name`, sorted
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Get number of packages in the graph
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get number of dependencies in the graph
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// First dependency cycle found, as package names
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.len() > 1)
            .map(|component| {
                let mut names: Vec<String> = component.iter().map(|&idx| self.graph[idx].name.clone()).collect();
                names.sort();
                names
            })
    }

    /// Format cycle as "a -> b -> c -> a"
    pub fn format_cycle(cycle: &[String]) -> String {
        if cycle.is_empty() {
            return "No cycle".to_string();
        }
        let mut closed = cycle.to_vec();
        if closed.len() > 1 {
            closed.push(closed[0].clone());
        }
        closed.join(" -> ")
    }

    /// Records with every dependency before its dependents.
    ///
    /// Packages on a cycle are emitted together, in name order, at the
    /// position of the cycle.
    pub fn dependency_order(&self) -> Vec<Arc<PackageRecord>> {
        match toposort(&self.graph, None) {
            Ok(sorted) => sorted.into_iter().map(|idx| self.graph[idx].clone()).collect(),
            Err(_) => {
                if let Some(cycle) = self.detect_cycle() {
                    debug!("Dependency cycle: {}", Self::format_cycle(&cycle));
                }
                // tarjan_scc yields components in reverse topological order
                let mut components = tarjan_scc(&self.graph);
                components.reverse();
                components
                    .into_iter()
                    .flat_map(|mut component| {
                        component.sort_by(|&a, &b| self.graph[a].name.cmp(&self.graph[b].name));
                        component
                    })
                    .map(|idx| self.graph[idx].clone())
                    .collect()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::OrderedVersion;

    fn record(name: &str, depends: &[&str]) -> Arc<PackageRecord> {
        let mut record = PackageRecord::new(name, OrderedVersion::parse("1.0").unwrap(), "0");
        record.depends = depends.iter().map(|d| d.to_string()).collect();
        Arc::new(record)
    }

    fn names(records: &[Arc<PackageRecord>]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    fn position(order: &[&str], name: &str) -> usize {
        order.iter().position(|n| *n == name).unwrap()
    }

    #[test]
    fn test_dependency_graph_creation() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.package_count(), 0);
        assert_eq!(graph.dependency_count(), 0);
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn test_edges_from_depends() {
        let graph = DependencyGraph::from_records(&[
            record("app", &["lib >=1.0", "python 3.11.*"]),
            record("lib", &["zlib"]),
            record("zlib", &[]),
        ]);

        // python is not in the set
        assert_eq!(graph.package_count(), 3);
        assert_eq!(graph.dependency_count(), 2);
        assert_eq!(graph.dependents("lib"), vec!["app"]);
        assert_eq!(graph.dependents("zlib"), vec!["lib"]);
        assert!(graph.dependents("app").is_empty());
        assert_eq!(graph.get_package("lib").unwrap().name, "lib");
    }

    #[test]
    fn test_dependency_order() {
        let graph = DependencyGraph::from_records(&[
            record("app", &["lib", "zlib"]),
            record("lib", &["zlib"]),
            record("zlib", &[]),
        ]);
        let order = graph.dependency_order();
        assert_eq!(names(&order), vec!["zlib", "lib", "app"]);
    }

    #[test]
    fn test_cycles_fall_back_to_name_order() {
        let graph = DependencyGraph::from_records(&[
            record("app", &["b"]),
            record("b", &["a"]),
            record("a", &["b", "base"]),
            record("base", &[]),
        ]);

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(DependencyGraph::format_cycle(&cycle), "a -> b -> a");

        let order = graph.dependency_order();
        let order = names(&order);
        assert_eq!(order.len(), 4);
        assert!(position(&order, "base") < position(&order, "a"));
        assert_eq!(position(&order, "a") + 1, position(&order, "b"));
        assert!(position(&order, "b") < position(&order, "app"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use sprig_core::OrderedVersion;

    proptest! {
        #[test]
        fn dependency_order_respects_edges(
            num_packages in 2usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..16)
        ) {
            let mut depends: Vec<Vec<String>> = vec![Vec::new(); num_packages];
            for (from, to) in edges {
                if from < num_packages && to < num_packages && from != to {
                    depends[from].push(format!("pkg{}", to));
                }
            }
            let records: Vec<_> = depends
                .into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    let mut record = PackageRecord::new(&format!("pkg{}", i), OrderedVersion::parse("1.0").unwrap(), "0");
                    record.depends = deps;
                    Arc::new(record)
                })
                .collect();

            let graph = DependencyGraph::from_records(&records);
            let order: Vec<String> = graph.dependency_order().iter().map(|r| r.name.clone()).collect();

            // every package exactly once
            let mut sorted = order.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), num_packages);

            // acyclic graphs put dependencies first
            if graph.detect_cycle().is_none() {
                for record in &records {
                    let at = order.iter().position(|n| *n == record.name).unwrap();
                    for dep in &record.depends {
                        let dep_at = order.iter().position(|n| n == dep).unwrap();
                        prop_assert!(dep_at < at, "{} should come before {}", dep, record.name);
                    }
                }
            }

            // same input, same order
            let again: Vec<String> = DependencyGraph::from_records(&records)
                .dependency_order()
                .iter()
                .map(|r| r.name.clone())
                .collect();
            prop_assert_eq!(order, again);
        }
    }
}
