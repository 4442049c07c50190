//! Error types for graph construction, analysis and configuration
//!
//! Every fallible operation in the library returns one of these instead of
//! silently accepting malformed input. The binary wraps them in `anyhow`.

use thiserror::Error;

/// Errors raised while building or validating a [`crate::graph::Graph`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {0} is out of bounds (graph has {1} nodes)")]
    NodeOutOfBounds(usize, usize),

    #[error("edge ({a}, {b}) has invalid weight {weight}: weights must be finite and non-negative")]
    InvalidWeight { a: usize, b: usize, weight: f64 },
}

/// Errors raised by a decision policy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("threshold `{name}` has invalid value {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("invalid optimizer limits: {0}")]
    InvalidLimits(String),
}

/// Errors raised while loading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
