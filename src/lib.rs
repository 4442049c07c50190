//! querygraph - graph-topology anomaly detection for SQL queries
//!
//! A query's table/column access pattern arrives as a weighted undirected
//! [`Graph`]. A [`DecisionPolicy`] scores its topology, either by edge
//! density or by Louvain modularity, and returns a [`Verdict`] that is
//! reported to the audit log.

pub mod analyzer;
pub mod audit;
pub mod cli;
pub mod community;
pub mod config;
pub mod errors;
pub mod graph;
pub mod policy;
pub mod verdict;

pub use analyzer::{analyze_with_all, QueryAnalyzer};
pub use audit::{AuditEvent, AuditListener, AuditLog, ListenerId, MemoryListener, TracingListener};
pub use community::{CommunityOptimizer, CommunityReport, OptimizerLimits, Partition};
pub use config::{load_config, AnalyzerConfig};
pub use errors::{AnalysisError, ConfigError, GraphError};
pub use graph::{Graph, GraphSpec};
pub use policy::{
    build_policy, DecisionPolicy, DensityPolicy, KnowledgeSource, Mode, ModularityPolicy,
    NullKnowledge, PolicyContext, PolicyKind,
};
pub use verdict::{keys, EventType, PropertyValue, Verdict, VerdictBuilder};
