//! Decision policies
//!
//! A policy turns a query's access graph into a [`Verdict`]. Every policy
//! implements the single-operation [`DecisionPolicy`] trait; which one runs is
//! picked from configuration by [`build_policy`].

pub mod density;
pub mod modularity;

pub use density::DensityPolicy;
pub use modularity::ModularityPolicy;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::audit::AuditLog;
use crate::community::CommunityOptimizer;
use crate::config::AnalyzerConfig;
use crate::errors::AnalysisError;
use crate::graph::Graph;
use crate::verdict::Verdict;

/// Operating mode of the surrounding detector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Queries are recorded as training material
    Training,
    /// Queries are classified
    #[default]
    Detection,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Training => write!(f, "training"),
            Mode::Detection => write!(f, "detection"),
        }
    }
}

/// Source of learned knowledge about the protected database.
///
/// Opaque to the policies in this crate: they keep the reference but do not
/// consult it.
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;
}

/// Knowledge source that knows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKnowledge;

impl KnowledgeSource for NullKnowledge {
    fn name(&self) -> &str {
        "none"
    }
}

/// Collaborators every policy is constructed with.
#[derive(Clone)]
pub struct PolicyContext {
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub audit: Arc<AuditLog>,
    pub mode: Mode,
}

impl PolicyContext {
    pub fn new(knowledge: Arc<dyn KnowledgeSource>, audit: Arc<AuditLog>, mode: Mode) -> Self {
        Self {
            knowledge,
            audit,
            mode,
        }
    }

    /// Context with no knowledge and a private, listener-less audit log.
    pub fn detached(mode: Mode) -> Self {
        Self::new(Arc::new(NullKnowledge), Arc::new(AuditLog::new()), mode)
    }
}

impl fmt::Debug for PolicyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("knowledge", &self.knowledge.name())
            .field("audit", &self.audit)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Trait for all decision policies
///
/// # Example Implementation
///
/// ```ignore
/// pub struct EdgeCountPolicy {
///     context: PolicyContext,
/// }
///
/// impl DecisionPolicy for EdgeCountPolicy {
///     fn name(&self) -> &'static str {
///         "EdgeCountPolicy"
///     }
///
///     fn description(&self) -> &'static str {
///         "Flags queries touching too many relations"
///     }
///
///     fn context(&self) -> &PolicyContext {
///         &self.context
///     }
///
///     fn analyze_graph(&self, graph: &Graph) -> Result<Verdict, AnalysisError> {
///         Ok(Verdict::builder(EventType::Normal).build())
///     }
/// }
/// ```
pub trait DecisionPolicy: Send + Sync {
    /// Unique identifier for this policy
    fn name(&self) -> &'static str;

    /// Human-readable description of what this policy checks
    fn description(&self) -> &'static str;

    /// Collaborators the policy was built with
    fn context(&self) -> &PolicyContext;

    /// Classify one query graph.
    ///
    /// Must not mutate the graph and must not change the policy's own
    /// configuration. Either a complete verdict comes back or an error.
    fn analyze_graph(&self, graph: &Graph) -> Result<Verdict, AnalysisError>;
}

/// The closed set of policies selectable from configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Density,
    #[default]
    Modularity,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Density => write!(f, "density"),
            PolicyKind::Modularity => write!(f, "modularity"),
        }
    }
}

/// Build the policy selected by `config.policy.kind`.
///
/// # Errors
/// - `InvalidThreshold` if a configured threshold is not a finite number
/// - `InvalidLimits` if the optimizer limits are unusable
pub fn build_policy(
    config: &AnalyzerConfig,
    context: PolicyContext,
) -> Result<Box<dyn DecisionPolicy>, AnalysisError> {
    match config.policy.kind {
        PolicyKind::Density => Ok(Box::new(DensityPolicy::new(
            context,
            config.density.accepted_density,
        )?)),
        PolicyKind::Modularity => Ok(Box::new(
            ModularityPolicy::new(
                context,
                config.modularity.accepted_modularity,
                config.modularity.edge_weight_threshold,
            )?
            .with_optimizer(CommunityOptimizer::with_limits(config.optimizer.limits())?),
        )),
    }
}

/// Reject thresholds that would make every comparison meaningless.
fn check_threshold(name: &'static str, value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::InvalidThreshold { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::EventType;

    #[test]
    fn test_build_policy_selects_kind() {
        let mut config = AnalyzerConfig::default();
        config.policy.kind = PolicyKind::Density;
        let policy = build_policy(&config, PolicyContext::detached(Mode::Detection)).unwrap();
        assert_eq!(policy.name(), "DensityPolicy");

        config.policy.kind = PolicyKind::Modularity;
        let policy = build_policy(&config, PolicyContext::detached(Mode::Training)).unwrap();
        assert_eq!(policy.name(), "ModularityPolicy");
        assert_eq!(policy.context().mode, Mode::Training);
    }

    #[test]
    fn test_build_policy_rejects_nan() {
        let mut config = AnalyzerConfig::default();
        config.policy.kind = PolicyKind::Density;
        config.density.accepted_density = f64::NAN;
        let err = build_policy(&config, PolicyContext::detached(Mode::Detection)).err();
        assert!(matches!(
            err,
            Some(AnalysisError::InvalidThreshold { name: "accepted_density", .. })
        ));
    }

    #[test]
    fn test_build_policy_rejects_bad_limits() {
        let mut config = AnalyzerConfig::default();
        config.optimizer.tolerance = -1.0;
        let err = build_policy(&config, PolicyContext::detached(Mode::Detection)).err();
        assert!(matches!(err, Some(AnalysisError::InvalidLimits(_))));
    }

    #[test]
    fn test_policies_are_object_safe_and_shareable() {
        let policies: Vec<Box<dyn DecisionPolicy>> = vec![
            Box::new(DensityPolicy::new(PolicyContext::detached(Mode::Detection), 0.0).unwrap()),
            Box::new(
                ModularityPolicy::new(PolicyContext::detached(Mode::Detection), 1.0, 0.0).unwrap(),
            ),
        ];
        let graph = Graph::from_edges(2, &[(0, 1, 1.0)]).unwrap();
        for policy in &policies {
            let verdict = policy.analyze_graph(&graph).unwrap();
            assert_eq!(verdict.classification(), EventType::Normal);
        }
    }

    #[test]
    fn test_mode_and_kind_serde() {
        assert_eq!(serde_json::to_string(&Mode::Training).unwrap(), "\"training\"");
        assert_eq!(Mode::Detection.to_string(), "detection");
        let kind: PolicyKind = serde_json::from_str("\"density\"").unwrap();
        assert_eq!(kind, PolicyKind::Density);
    }
}
