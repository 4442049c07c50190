//! Density policy
//!
//! Compares the observed edge weight with the largest weight the graph could
//! carry if every node pair, self-pairs included, were linked once:
//!
//!   density = total_weight / (n(n-1)/2 + n)
//!
//! Sparse access patterns are anomalous. An empty graph is dense by convention.

use tracing::debug;

use super::{check_threshold, DecisionPolicy, PolicyContext};
use crate::errors::AnalysisError;
use crate::graph::Graph;
use crate::verdict::{keys, EventType, Verdict};

/// Flags graphs whose density falls below `accepted_density`.
#[derive(Debug, Clone)]
pub struct DensityPolicy {
    context: PolicyContext,
    accepted_density: f64,
}

impl DensityPolicy {
    /// # Errors
    /// - `InvalidThreshold` if `accepted_density` is not finite
    pub fn new(context: PolicyContext, accepted_density: f64) -> Result<Self, AnalysisError> {
        Ok(Self {
            context,
            accepted_density: check_threshold("accepted_density", accepted_density)?,
        })
    }

    pub fn accepted_density(&self) -> f64 {
        self.accepted_density
    }

    /// Density of `graph`; `1.0` for a graph without nodes.
    pub fn density(graph: &Graph) -> f64 {
        let n = graph.node_count();
        if n == 0 {
            return 1.0;
        }
        let n = n as f64;
        graph.total_weight() / (n * (n - 1.0) / 2.0 + n)
    }
}

impl DecisionPolicy for DensityPolicy {
    fn name(&self) -> &'static str {
        "DensityPolicy"
    }

    fn description(&self) -> &'static str {
        "Flags queries whose access graph is sparser than the accepted density"
    }

    fn context(&self) -> &PolicyContext {
        &self.context
    }

    fn analyze_graph(&self, graph: &Graph) -> Result<Verdict, AnalysisError> {
        let density = Self::density(graph);
        let classification = if density >= self.accepted_density {
            EventType::Normal
        } else {
            EventType::Anomaly
        };
        debug!(
            density,
            accepted = self.accepted_density,
            nodes = graph.node_count(),
            %classification,
            "density verdict"
        );

        Ok(Verdict::builder(classification)
            .property(keys::DENSITY, density)
            .property(keys::NODE_NUMBER, graph.node_count())
            .property(keys::TOTAL_WEIGHT, graph.total_weight())
            .build())
    }
}
