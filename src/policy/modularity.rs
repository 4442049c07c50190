//! Modularity policy
//!
//! Drops light edges, forgets the remaining weights, and scores the resulting
//! unweighted graph with the Louvain optimizer. Access patterns that split
//! into strongly separated clusters are anomalous, so the comparison is the
//! reverse of the density policy: high modularity is flagged.

use std::collections::BTreeMap;

use tracing::debug;

use super::{check_threshold, DecisionPolicy, PolicyContext};
use crate::community::CommunityOptimizer;
use crate::errors::AnalysisError;
use crate::graph::Graph;
use crate::verdict::{keys, EventType, Verdict};

/// Flags graphs whose community structure exceeds `accepted_modularity`.
#[derive(Debug, Clone)]
pub struct ModularityPolicy {
    context: PolicyContext,
    accepted_modularity: f64,
    edge_weight_threshold: f64,
    optimizer: CommunityOptimizer,
}

impl ModularityPolicy {
    /// # Errors
    /// - `InvalidThreshold` if either threshold is not finite
    pub fn new(
        context: PolicyContext,
        accepted_modularity: f64,
        edge_weight_threshold: f64,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            context,
            accepted_modularity: check_threshold("accepted_modularity", accepted_modularity)?,
            edge_weight_threshold: check_threshold("edge_weight_threshold", edge_weight_threshold)?,
            optimizer: CommunityOptimizer::new(),
        })
    }

    /// Use an optimizer with custom safety limits.
    pub fn with_optimizer(mut self, optimizer: CommunityOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn accepted_modularity(&self) -> f64 {
        self.accepted_modularity
    }

    pub fn edge_weight_threshold(&self) -> f64 {
        self.edge_weight_threshold
    }

    /// Unweighted copy of `graph` with the same nodes.
    ///
    /// Parallel edges between the same pair are summed first; the pair gets a
    /// single unit edge when that sum reaches `edge_weight_threshold`.
    pub fn simplify_graph(&self, graph: &Graph) -> Graph {
        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (a, b, weight) in graph.edges() {
            *pairs.entry((a, b)).or_insert(0.0) += weight;
        }

        let mut simplified = Graph::new(graph.node_count());
        for (&(a, b), &weight) in &pairs {
            if weight >= self.edge_weight_threshold {
                simplified.insert_edge(a, b, 1.0);
            }
        }
        simplified
    }
}

impl DecisionPolicy for ModularityPolicy {
    fn name(&self) -> &'static str {
        "ModularityPolicy"
    }

    fn description(&self) -> &'static str {
        "Flags queries whose access graph splits into strongly separated communities"
    }

    fn context(&self) -> &PolicyContext {
        &self.context
    }

    fn analyze_graph(&self, graph: &Graph) -> Result<Verdict, AnalysisError> {
        let simplified = self.simplify_graph(graph);
        let report = self.optimizer.detect(&simplified);

        let classification = if report.modularity <= self.accepted_modularity {
            EventType::Normal
        } else {
            EventType::Anomaly
        };
        debug!(
            modularity = report.modularity,
            accepted = self.accepted_modularity,
            communities = report.community_count(),
            kept_edges = simplified.edge_count(),
            %classification,
            "modularity verdict"
        );

        Ok(Verdict::builder(classification)
            .property(keys::MODULARITY, report.modularity)
            .property(keys::COMMUNITY_COUNT, report.community_count())
            .property(keys::EDGE_COUNT, simplified.edge_count())
            .build())
    }
}
