//! Weighted undirected multigraph
//!
//! Nodes are dense indices `0..node_count`. Every inserted edge appends to the
//! adjacency lists of both endpoints (one entry for a self-loop) and bumps
//! `total_weight` exactly once. Edges are never removed.

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::errors::GraphError;

/// Weighted undirected multigraph with adjacency lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Graph {
    adjacency: Vec<Vec<(usize, f64)>>,
    total_weight: f64,
    edge_count: usize,
}

impl Graph {
    /// Create a graph with `node_count` isolated nodes.
    pub fn new(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
            total_weight: 0.0,
            edge_count: 0,
        }
    }

    /// Build a graph from a list of `(a, b, weight)` edges.
    ///
    /// # Errors
    /// Same as [`Graph::add_edge`], reported for the first offending edge.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize, f64)]) -> Result<Self, GraphError> {
        let mut graph = Self::new(node_count);
        for &(a, b, weight) in edges {
            graph.add_edge(a, b, weight)?;
        }
        Ok(graph)
    }

    /// Build a graph from a petgraph undirected graph. Node indices map 1:1.
    pub fn from_petgraph<N>(source: &UnGraph<N, f64>) -> Result<Self, GraphError> {
        let mut graph = Self::new(source.node_count());
        for edge in source.edge_references() {
            graph.add_edge(edge.source().index(), edge.target().index(), *edge.weight())?;
        }
        Ok(graph)
    }

    /// Insert an undirected edge.
    ///
    /// # Errors
    /// - `NodeOutOfBounds` if either endpoint is `>= node_count`
    /// - `InvalidWeight` if the weight is negative or not finite
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) -> Result<(), GraphError> {
        let n = self.node_count();
        if a >= n {
            return Err(GraphError::NodeOutOfBounds(a, n));
        }
        if b >= n {
            return Err(GraphError::NodeOutOfBounds(b, n));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::InvalidWeight { a, b, weight });
        }

        self.insert_edge(a, b, weight);
        Ok(())
    }

    /// Append an edge whose endpoints and weight are already known to be valid.
    pub(crate) fn insert_edge(&mut self, a: usize, b: usize, weight: f64) {
        self.adjacency[a].push((b, weight));
        if a != b {
            self.adjacency[b].push((a, weight));
        }
        self.total_weight += weight;
        self.edge_count += 1;
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of `add_edge` calls that succeeded (self-loops included).
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Sum of inserted edge weights, each edge counted once.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Sum of the weights of every adjacency entry of `node`.
    /// A self-loop has a single entry, so it counts once.
    pub fn weighted_degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|&(_, w)| w).sum()
    }

    /// Weight of the self-loop on `node`, 0 if there is none.
    /// Repeated self-loops on the same node are summed.
    pub fn self_loop_weight(&self, node: usize) -> f64 {
        self.adjacency[node]
            .iter()
            .filter(|&&(neighbor, _)| neighbor == node)
            .map(|&(_, w)| w)
            .sum()
    }

    /// Adjacency entries of `node` in insertion order.
    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.adjacency[node]
    }

    /// Iterate over every undirected edge once, as `(a, b, weight)` with `a <= b`.
    ///
    /// Parallel edges are yielded separately.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(a, list)| {
            list.iter()
                .filter(move |&&(b, _)| a <= b)
                .map(move |&(b, w)| (a, b, w))
        })
    }

    /// Replace the running total. Coarsened graphs keep the total of the graph
    /// they were collapsed from so modularity stays comparable across levels.
    pub(crate) fn with_total_weight(mut self, total_weight: f64) -> Self {
        self.total_weight = total_weight;
        self
    }
}

/// Serialized edge-list form of a graph: `{"nodes": 3, "edges": [[0, 1, 1.0]]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: usize,
    #[serde(default)]
    pub edges: Vec<(usize, usize, f64)>,
}

impl GraphSpec {
    pub fn into_graph(self) -> Result<Graph, GraphError> {
        Graph::from_edges(self.nodes, &self.edges)
    }
}

impl TryFrom<GraphSpec> for Graph {
    type Error = GraphError;

    fn try_from(spec: GraphSpec) -> Result<Self, Self::Error> {
        spec.into_graph()
    }
}

impl From<&Graph> for GraphSpec {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.node_count(),
            edges: graph.edges().collect(),
        }
    }
}
