//! Scaffold adjacency graph: construction from pair counts and degree pruning.
//!
//! Nodes are scaffold ids stored in insertion order; a node's index is its
//! position in that order and is recomputed whenever nodes are removed.

use indexmap::IndexSet;
use std::collections::HashSet;

use crate::config::LinkConfig;
use crate::pairing::{Orientation, PairMap};
use crate::stats::is_dominant;

/// Undirected link between two scaffolds, `source < target` by node index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: u32,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaffoldGraph {
    nodes: IndexSet<String>,
    edges: Vec<Edge>,
    connected: HashSet<(usize, usize)>,
}

impl ScaffoldGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a scaffold, adding it if it is new
    pub fn add_node(&mut self, scaffold: &str) -> usize {
        match self.nodes.get_index_of(scaffold) {
            Some(index) => index,
            None => self.nodes.insert_full(scaffold.to_string()).0,
        }
    }

    /// Add an edge between two existing nodes.
    /// Returns false, leaving the graph unchanged, for a self-loop, an unknown
    /// node or a pair that is already connected.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: u32, orientation: Orientation) -> bool {
        if a == b || a >= self.nodes.len() || b >= self.nodes.len() {
            return false;
        }
        let key = (a.min(b), a.max(b));
        if !self.connected.insert(key) {
            return false;
        }
        self.edges.push(Edge {
            source: key.0,
            target: key.1,
            weight,
            orientation,
        });
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_name(&self, index: usize) -> Option<&str> {
        self.nodes.get_index(index).map(String::as_str)
    }

    pub fn node_index(&self, scaffold: &str) -> Option<usize> {
        self.nodes.get_index_of(scaffold)
    }

    /// Scaffold ids in index order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edge between two scaffolds, in either order
    pub fn edge_between(&self, a: &str, b: &str) -> Option<&Edge> {
        let a = self.node_index(a)?;
        let b = self.node_index(b)?;
        let (source, target) = (a.min(b), a.max(b));
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    /// Number of incident edges for every node, by index
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in &self.edges {
            degrees[edge.source] += 1;
            degrees[edge.target] += 1;
        }
        degrees
    }

    pub fn degree(&self, scaffold: &str) -> Option<usize> {
        let index = self.node_index(scaffold)?;
        Some(
            self.edges
                .iter()
                .filter(|e| e.source == index || e.target == index)
                .count(),
        )
    }

    /// Remove every node whose degree exceeds `max_degree`, with its edges.
    ///
    /// Degrees are measured once, before anything is removed, so removing one
    /// hub never rescues another. Surviving nodes keep their relative order and
    /// are renumbered from 0. `max_degree == 0` leaves the graph untouched.
    /// Returns the number of nodes removed.
    pub fn prune_by_degree(&mut self, max_degree: usize) -> usize {
        if max_degree == 0 {
            return 0;
        }

        let flagged: Vec<bool> = self.degrees().into_iter().map(|d| d > max_degree).collect();
        let removed = flagged.iter().filter(|&&f| f).count();
        if removed == 0 {
            return 0;
        }

        let old_nodes = std::mem::take(&mut self.nodes);
        let old_edges = std::mem::take(&mut self.edges);
        self.connected.clear();

        let mut remap = vec![None; old_nodes.len()];
        for (old_index, name) in old_nodes.into_iter().enumerate() {
            if !flagged[old_index] {
                remap[old_index] = Some(self.nodes.insert_full(name).0);
            }
        }

        for edge in old_edges {
            if let (Some(source), Some(target)) = (remap[edge.source], remap[edge.target]) {
                self.add_edge(source, target, edge.weight, edge.orientation);
            }
        }

        removed
    }
}

/// Build the graph from pair counts.
///
/// For each pair the dominant orientation is the largest count (lowest index on
/// ties). The pair becomes an edge when that count reaches `min_links` and beats
/// the runner-up orientation by a significant margin.
pub fn build_graph(pairs: &PairMap, config: &LinkConfig) -> ScaffoldGraph {
    let mut graph = ScaffoldGraph::new();

    for (key, counts) in pairs {
        let (max, orientation) = counts.max();
        if max < config.min_links {
            continue;
        }
        if !is_dominant(max, counts.runner_up(), config.max_error) {
            continue;
        }
        let a = graph.add_node(key.first());
        let b = graph.add_node(key.second());
        graph.add_edge(a, b, max, orientation);
    }

    log::debug!(
        "Kept {} of {} scaffold pairs as edges",
        graph.edge_count(),
        pairs.len()
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::{OrientationCounts, PairKey};

    fn pair_map(entries: &[(&str, &str, [u32; 4])]) -> PairMap {
        entries
            .iter()
            .map(|&(a, b, c)| (PairKey::new(a, b).unwrap(), OrientationCounts(c)))
            .collect()
    }

    #[test]
    fn test_add_edge_rejects_duplicates() {
        let mut graph = ScaffoldGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        assert_eq!(graph.add_node("a"), a);
        assert!(graph.add_edge(a, b, 3, Orientation::HeadHead));
        assert!(!graph.add_edge(b, a, 5, Orientation::TailTail));
        assert!(!graph.add_edge(a, a, 1, Orientation::HeadHead));
        assert!(!graph.add_edge(a, 7, 1, Orientation::HeadHead));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges()[0].weight, 3);
    }

    #[test]
    fn test_build_graph_picks_dominant_orientation() {
        let pairs = pair_map(&[("s1", "s2", [0, 0, 9, 0])]);
        let graph = build_graph(&pairs, &LinkConfig::default());
        let edge = graph.edge_between("s2", "s1").unwrap();
        assert_eq!(edge.weight, 9);
        assert_eq!(edge.orientation, Orientation::TailHead);
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec!["s1", "s2"]);
    }

    #[test]
    fn test_build_graph_min_links() {
        let pairs = pair_map(&[("s1", "s2", [4, 0, 0, 0])]);
        let config = LinkConfig {
            min_links: 5,
            ..Default::default()
        };
        let graph = build_graph(&pairs, &config);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_build_graph_ambiguous_orientation() {
        // Tied maximum: runner-up is 0 so the margin test passes on HH
        let tied = pair_map(&[("s1", "s2", [3, 3, 0, 0])]);
        let edge = *build_graph(&tied, &LinkConfig::default())
            .edge_between("s1", "s2")
            .unwrap();
        assert_eq!(edge.orientation, Orientation::HeadHead);

        // Close counts fail a strict margin test
        let close = pair_map(&[("s1", "s2", [3, 2, 0, 0])]);
        let strict = LinkConfig {
            max_error: 0.001,
            ..Default::default()
        };
        assert_eq!(build_graph(&close, &LinkConfig::default()).edge_count(), 1);
        assert_eq!(build_graph(&close, &strict).edge_count(), 0);
    }

    #[test]
    fn test_all_zero_counts_never_link() {
        let pairs = pair_map(&[("s1", "s2", [0, 0, 0, 0])]);
        assert_eq!(build_graph(&pairs, &LinkConfig::default()).edge_count(), 0);
        let config = LinkConfig {
            min_links: 1,
            ..Default::default()
        };
        assert_eq!(build_graph(&pairs, &config).edge_count(), 0);
    }

    #[test]
    fn test_prune_by_degree() {
        let mut graph = ScaffoldGraph::new();
        let hub = graph.add_node("hub");
        let leaves: Vec<usize> = ["a", "b", "c"].iter().map(|n| graph.add_node(n)).collect();
        for &leaf in &leaves {
            graph.add_edge(hub, leaf, 5, Orientation::HeadTail);
        }
        let d = graph.add_node("d");
        graph.add_edge(leaves[0], d, 7, Orientation::TailTail);

        assert_eq!(graph.prune_by_degree(0), 0);
        assert_eq!(graph.node_count(), 5);

        assert_eq!(graph.prune_by_degree(2), 1);
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edges()[0];
        assert_eq!((edge.source, edge.target), (0, 3));
        assert_eq!(edge.weight, 7);
        // Leaves left without edges stay in the graph
        assert_eq!(graph.degree("b"), Some(0));
    }

    #[test]
    fn test_prune_uses_degrees_before_removal() {
        // Two adjacent hubs of degree 3: both go, even though removing one
        // would bring the other under the limit
        let mut graph = ScaffoldGraph::new();
        let h1 = graph.add_node("h1");
        let h2 = graph.add_node("h2");
        graph.add_edge(h1, h2, 1, Orientation::HeadHead);
        for name in ["x1", "x2"] {
            let n = graph.add_node(name);
            graph.add_edge(h1, n, 1, Orientation::HeadHead);
        }
        for name in ["y1", "y2"] {
            let n = graph.add_node(name);
            graph.add_edge(h2, n, 1, Orientation::HeadHead);
        }
        assert_eq!(graph.prune_by_degree(2), 2);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 4);
    }
}
