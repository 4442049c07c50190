//! Analyzer configuration
//!
//! Loaded from `querygraph.toml` or `.querygraphrc.json` in a directory, or
//! from an explicit file. Every field has a default, so an empty file is a
//! valid configuration.
//!
//! # Configuration Format
//!
//! ```toml
//! # querygraph.toml
//!
//! [policy]
//! kind = "modularity"   # or "density"
//! mode = "detection"    # or "training"
//!
//! [density]
//! accepted_density = 0.5
//!
//! [modularity]
//! accepted_modularity = 0.3
//! edge_weight_threshold = 0.5
//!
//! [optimizer]
//! max_passes = 1000
//! max_levels = 64
//! tolerance = 0.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::community::OptimizerLimits;
use crate::errors::ConfigError;
use crate::policy::{Mode, PolicyKind};

pub const TOML_FILE: &str = "querygraph.toml";
pub const JSON_FILE: &str = ".querygraphrc.json";

/// Full analyzer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub policy: PolicySection,
    pub density: DensitySection,
    pub modularity: ModularitySection,
    pub optimizer: OptimizerSection,
}

/// Which policy runs, and in which mode
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub kind: PolicyKind,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensitySection {
    /// Densities below this are anomalous
    pub accepted_density: f64,
}

impl Default for DensitySection {
    fn default() -> Self {
        Self {
            accepted_density: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModularitySection {
    /// Modularity above this is anomalous
    pub accepted_modularity: f64,
    /// Edges lighter than this are dropped before scoring
    pub edge_weight_threshold: f64,
}

impl Default for ModularitySection {
    fn default() -> Self {
        Self {
            accepted_modularity: 0.3,
            edge_weight_threshold: 0.5,
        }
    }
}

/// Safety limits for the Louvain optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSection {
    pub max_passes: usize,
    pub max_levels: usize,
    pub tolerance: f64,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        let limits = OptimizerLimits::default();
        Self {
            max_passes: limits.max_passes,
            max_levels: limits.max_levels,
            tolerance: limits.tolerance,
        }
    }
}

impl OptimizerSection {
    pub fn limits(&self) -> OptimizerLimits {
        OptimizerLimits {
            max_passes: self.max_passes,
            max_levels: self.max_levels,
            tolerance: self.tolerance,
        }
    }
}

impl AnalyzerConfig {
    /// Load an explicit configuration file. `.json` files are parsed as JSON,
    /// anything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: AnalyzerConfig = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every value can actually be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("density.accepted_density", self.density.accepted_density),
            ("modularity.accepted_modularity", self.modularity.accepted_modularity),
            ("modularity.edge_weight_threshold", self.modularity.edge_weight_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{} must be a finite number, got {}", name, value)));
            }
        }

        self.optimizer
            .limits()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("[optimizer] {}", e)))
    }
}

/// Discover the configuration in `dir`.
///
/// Tries `querygraph.toml`, then `.querygraphrc.json`. A file that fails to
/// load is logged and skipped; with nothing usable the defaults apply.
pub fn load_config(dir: &Path) -> AnalyzerConfig {
    for name in [TOML_FILE, JSON_FILE] {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        match AnalyzerConfig::from_file(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
            }
        }
    }

    debug!("No config found, using defaults");
    AnalyzerConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.policy.kind, PolicyKind::Modularity);
        assert_eq!(config.policy.mode, Mode::Detection);
        assert_eq!(config.density.accepted_density, 0.5);
        assert_eq!(config.modularity.accepted_modularity, 0.3);
        assert_eq!(config.modularity.edge_weight_threshold, 0.5);
        assert_eq!(config.optimizer.limits(), OptimizerLimits::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            [policy]
            kind = "density"

            [density]
            accepted_density = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.kind, PolicyKind::Density);
        assert_eq!(config.policy.mode, Mode::Detection);
        assert_eq!(config.density.accepted_density, 0.25);
        assert_eq!(config.modularity, ModularitySection::default());
    }

    #[test]
    fn test_load_prefers_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(TOML_FILE), "[policy]\nmode = \"training\"\n").unwrap();
        fs::write(dir.path().join(JSON_FILE), r#"{"policy": {"kind": "density"}}"#).unwrap();

        let config = load_config(dir.path());
        assert_eq!(config.policy.mode, Mode::Training);
        assert_eq!(config.policy.kind, PolicyKind::Modularity);
    }

    #[test]
    fn test_load_falls_back_to_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(TOML_FILE), "this is not toml [").unwrap();
        fs::write(
            dir.path().join(JSON_FILE),
            r#"{"modularity": {"accepted_modularity": 0.4}}"#,
        )
        .unwrap();

        let config = load_config(dir.path());
        assert_eq!(config.modularity.accepted_modularity, 0.4);
        assert_eq!(config.modularity.edge_weight_threshold, 0.5);
    }

    #[test]
    fn test_load_missing_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_config(dir.path()), AnalyzerConfig::default());
    }

    #[test]
    fn test_from_file_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[optimizer]\nmax_passes = 0\n").unwrap();
        assert!(matches!(AnalyzerConfig::from_file(&path), Err(ConfigError::Invalid(_))));

        let path = dir.path().join("negative.toml");
        fs::write(&path, "[optimizer]\ntolerance = -1.0\n").unwrap();
        assert!(matches!(AnalyzerConfig::from_file(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(AnalyzerConfig::from_file(&path), Err(ConfigError::Json(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(AnalyzerConfig::from_file(&missing), Err(ConfigError::Io(_))));
    }
}
