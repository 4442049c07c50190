//! Query analysis orchestration
//!
//! Runs the configured policy on a query graph and reports the outcome to the
//! audit log. This is the caller side of the policy contract: it owns the
//! mode-dependent labelling and the ERROR event, the policies stay pure.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audit::{AuditEvent, AuditLog};
use crate::errors::AnalysisError;
use crate::graph::Graph;
use crate::policy::{DecisionPolicy, Mode};
use crate::verdict::{keys, EventType, Verdict};

/// Policy plus the audit trail it reports into.
pub struct QueryAnalyzer {
    policy: Box<dyn DecisionPolicy>,
    audit: Arc<AuditLog>,
    mode: Mode,
}

impl QueryAnalyzer {
    /// Build an analyzer that uses the policy's own audit log and mode.
    pub fn new(policy: Box<dyn DecisionPolicy>) -> Self {
        let audit = Arc::clone(&policy.context().audit);
        let mode = policy.context().mode;
        Self {
            policy,
            audit,
            mode,
        }
    }

    pub fn policy(&self) -> &dyn DecisionPolicy {
        self.policy.as_ref()
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Classify one query and record the outcome.
    ///
    /// In training mode the verdict is returned as `TRAINING_QUERY` with the
    /// policy's diagnostics. When the policy fails an `ERROR` event is
    /// recorded and the error is returned unchanged.
    pub fn analyze(&self, user_id: &str, sql_query: &str, graph: &Graph) -> Result<Verdict, AnalysisError> {
        let verdict = match self.policy.analyze_graph(graph) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(policy = self.policy.name(), user = user_id, error = %e, "policy failed");
                let mut properties = BTreeMap::new();
                properties.insert(keys::ERROR.to_string(), e.to_string());
                self.audit.notify(&AuditEvent::new(
                    user_id,
                    sql_query,
                    EventType::Error,
                    self.mode,
                    properties,
                ));
                return Err(e);
            }
        };

        let verdict = match self.mode {
            Mode::Training => verdict.relabel(EventType::TrainingQuery),
            Mode::Detection => verdict,
        };

        let event = AuditEvent::new(
            user_id,
            sql_query,
            verdict.classification(),
            self.mode,
            verdict.audit_properties(),
        );
        let notified = self.audit.notify(&event);
        debug!(
            policy = self.policy.name(),
            classification = %verdict.classification(),
            notified,
            "query analyzed"
        );

        Ok(verdict)
    }
}

/// Run several policies over the same graph in parallel.
///
/// The graph is shared read-only; each policy run builds its own optimizer
/// state. Results come back in the order of `policies`.
pub fn analyze_with_all(
    policies: &[Box<dyn DecisionPolicy>],
    graph: &Graph,
) -> Vec<Result<Verdict, AnalysisError>> {
    policies
        .par_iter()
        .map(|policy| policy.analyze_graph(graph))
        .collect()
}
