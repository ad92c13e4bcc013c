//! Provider dependency graph and topological ordering
//!
//! Nodes are providers; an edge `a -> b` means `a` declares a dependency on
//! `b`. Sorting yields dependencies before dependents. Nodes are inserted in
//! a fixed order by the registry, so the resulting order does not depend on
//! the order in which providers were requested.

use super::MetadataError;
use super::provider::ProviderKey;
use petgraph::Direction;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Dependency graph over provider keys
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ProviderKey, ()>,
    node_map: HashMap<ProviderKey, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider; returns the existing index if already present
    pub fn add_node(&mut self, key: ProviderKey) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key);
        self.node_map.insert(key, idx);
        idx
    }

    /// `dependent` requires `dependency` to be computed first
    pub fn add_edge(&mut self, dependent: ProviderKey, dependency: ProviderKey) {
        let from = self.add_node(dependent);
        let to = self.add_node(dependency);
        self.graph.update_edge(from, to, ());
    }

    /// Direct dependencies of `key`
    pub fn get_dependencies(&self, key: &ProviderKey) -> Vec<ProviderKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Providers that directly depend on `key`
    pub fn get_dependents(&self, key: &ProviderKey) -> Vec<ProviderKey> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &ProviderKey, direction: Direction) -> Vec<ProviderKey> {
        let Some(&idx) = self.node_map.get(key) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, direction)
            .map(|edge| match direction {
                Direction::Outgoing => self.graph[edge.target()],
                Direction::Incoming => self.graph[edge.source()],
            })
            .collect()
    }

    /// Providers in dependency order (dependencies before dependents)
    ///
    /// # Errors
    ///
    /// Returns `CyclicMetadataDependency` if the graph contains a cycle.
    pub fn topological_sort(&self) -> Result<Vec<ProviderKey>, MetadataError> {
        trace!(
            "Performing topological sort on {} providers",
            self.graph.node_count()
        );

        if is_cyclic_directed(&self.graph)
            && let Some(cycle) = self.find_cycles().into_iter().next()
        {
            return Err(MetadataError::cyclic(&cycle));
        }

        match toposort(&self.graph, None) {
            Ok(sorted) => {
                let mut order: Vec<ProviderKey> =
                    sorted.into_iter().map(|idx| self.graph[idx]).collect();
                // Edges point from dependent to dependency
                order.reverse();
                debug!("Resolved provider order of {} providers", order.len());
                Ok(order)
            }
            Err(cycle) => Err(MetadataError::cyclic(&[self.graph[cycle.node_id()]])),
        }
    }

    /// All cycles, each closed by repeating its first provider
    pub fn find_cycles(&self) -> Vec<Vec<ProviderKey>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || (scc.len() == 1 && self.graph.contains_edge(scc[0], scc[0]))
            })
            .map(|scc| {
                let mut cycle: Vec<ProviderKey> = scc.iter().map(|&idx| self.graph[idx]).collect();
                cycle.reverse();
                if let Some(&first) = cycle.first() {
                    cycle.push(first);
                }
                cycle
            })
            .collect()
    }

    /// Whether `from` transitively depends on `to`
    pub fn has_path(&self, from: &ProviderKey, to: &ProviderKey) -> bool {
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::provider::{ComputeContext, MetadataProvider, ProviderCache};

    macro_rules! test_provider {
        ($name:ident) => {
            struct $name;

            impl MetadataProvider for $name {
                type Value = ();
                const NAME: &'static str = stringify!($name);

                fn compute(_ctx: &ComputeContext<'_>) -> Result<ProviderCache<()>, MetadataError> {
                    Ok(ProviderCache::new())
                }
            }
        };
    }

    test_provider!(A);
    test_provider!(B);
    test_provider!(C);

    #[test]
    fn test_topological_order() {
        let (a, b, c) = (ProviderKey::of::<A>(), ProviderKey::of::<B>(), ProviderKey::of::<C>());
        let mut graph = DependencyGraph::new();
        graph.add_edge(c, b);
        graph.add_edge(b, a);

        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![a, b, c]);
        assert!(graph.has_path(&c, &a));
        assert!(!graph.has_path(&a, &c));
        assert_eq!(graph.get_dependencies(&c), vec![b]);
        assert_eq!(graph.get_dependents(&a), vec![b]);
    }

    #[test]
    fn test_cycle_detection() {
        let (a, b) = (ProviderKey::of::<A>(), ProviderKey::of::<B>());
        let mut graph = DependencyGraph::new();
        graph.add_edge(a, b);
        graph.add_edge(b, a);

        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);

        let err = graph.topological_sort().unwrap_err();
        assert!(matches!(err, MetadataError::CyclicMetadataDependency { .. }));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let a = ProviderKey::of::<A>();
        let mut graph = DependencyGraph::new();
        graph.add_edge(a, a);
        assert_eq!(graph.find_cycles(), vec![vec![a, a]]);
    }
}
