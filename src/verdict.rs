//! Verdicts returned by decision policies
//!
//! A verdict carries a classification plus named diagnostics. Diagnostic values
//! stay typed inside the library and are rendered to strings only when they
//! cross into the audit sink or a serialized report.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known diagnostic property keys
pub mod keys {
    pub const DENSITY: &str = "density";
    pub const NODE_NUMBER: &str = "nodeNumber";
    pub const TOTAL_WEIGHT: &str = "totalWeight";
    pub const MODULARITY: &str = "modularity";
    pub const COMMUNITY_COUNT: &str = "communityCount";
    pub const EDGE_COUNT: &str = "edgeCount";
    pub const ERROR: &str = "error";
}

/// Classification of an analyzed query.
///
/// The decision policies only produce `Normal` and `Anomaly`; the rest are
/// assigned by the surrounding orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Normal,
    Anomaly,
    NoDecision,
    Error,
    TrainingQuery,
    NoObservation,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Normal => write!(f, "NORMAL"),
            EventType::Anomaly => write!(f, "ANOMALY"),
            EventType::NoDecision => write!(f, "NO_DECISION"),
            EventType::Error => write!(f, "ERROR"),
            EventType::TrainingQuery => write!(f, "TRAINING_QUERY"),
            EventType::NoObservation => write!(f, "NO_OBSERVATION"),
        }
    }
}

/// Typed diagnostic value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Real(f64),
    Count(usize),
    Text(String),
}

impl PropertyValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Real(v) => Some(*v),
            PropertyValue::Count(n) => Some(*n as f64),
            PropertyValue::Text(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Debug keeps the decimal point on whole numbers ("1.0", not "1")
            PropertyValue::Real(v) => write!(f, "{:?}", v),
            PropertyValue::Count(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Real(value)
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Count(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

/// Outcome of one policy run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    classification: EventType,
    properties: BTreeMap<String, PropertyValue>,
}

impl Verdict {
    pub fn builder(classification: EventType) -> VerdictBuilder {
        VerdictBuilder {
            classification,
            properties: BTreeMap::new(),
        }
    }

    pub fn classification(&self) -> EventType {
        self.classification
    }

    pub fn is_anomaly(&self) -> bool {
        self.classification == EventType::Anomaly
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// String form of the properties, as handed to the audit sink.
    pub fn audit_properties(&self) -> BTreeMap<String, String> {
        self.properties
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }

    /// Same diagnostics under a different classification.
    pub(crate) fn relabel(self, classification: EventType) -> Self {
        Self {
            classification,
            properties: self.properties,
        }
    }
}

/// Incremental construction of a [`Verdict`].
#[derive(Debug, Clone)]
pub struct VerdictBuilder {
    classification: EventType,
    properties: BTreeMap<String, PropertyValue>,
}

impl VerdictBuilder {
    /// Set a property. A later value for the same key replaces the earlier one.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Verdict {
        Verdict {
            classification: self.classification,
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_display() {
        assert_eq!(PropertyValue::Real(1.0).to_string(), "1.0");
        assert_eq!(PropertyValue::Real(0.3).to_string(), "0.3");
        assert_eq!(PropertyValue::Count(4).to_string(), "4");
        assert_eq!(PropertyValue::from("x").to_string(), "x");
    }

    #[test]
    fn test_builder_keys_unique() {
        let verdict = Verdict::builder(EventType::Normal)
            .property(keys::DENSITY, 0.1)
            .property(keys::DENSITY, 0.2)
            .property(keys::NODE_NUMBER, 3usize)
            .build();

        assert_eq!(verdict.properties().len(), 2);
        assert_eq!(verdict.property(keys::DENSITY), Some(&PropertyValue::Real(0.2)));
        assert_eq!(verdict.property(keys::NODE_NUMBER).and_then(|v| v.as_f64()), Some(3.0));
        assert!(!verdict.is_anomaly());
    }

    #[test]
    fn test_audit_properties_are_strings() {
        let verdict = Verdict::builder(EventType::Anomaly)
            .property(keys::MODULARITY, 0.5)
            .build();
        let props = verdict.audit_properties();
        assert_eq!(props.get("modularity").map(String::as_str), Some("0.5"));
    }

    #[test]
    fn test_serialization_uses_boundary_strings() {
        let verdict = Verdict::builder(EventType::TrainingQuery)
            .property(keys::DENSITY, 1.0)
            .property(keys::NODE_NUMBER, 0usize)
            .build();
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["classification"], "TRAINING_QUERY");
        assert_eq!(json["properties"]["density"], "1.0");
        assert_eq!(json["properties"]["nodeNumber"], "0");
    }

    #[test]
    fn test_event_type_display_matches_serde() {
        for event in [
            EventType::Normal,
            EventType::Anomaly,
            EventType::NoDecision,
            EventType::Error,
            EventType::TrainingQuery,
            EventType::NoObservation,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event));
        }
    }

    #[test]
    fn test_relabel_keeps_properties() {
        let verdict = Verdict::builder(EventType::Anomaly)
            .property(keys::DENSITY, 0.3)
            .build()
            .relabel(EventType::TrainingQuery);
        assert_eq!(verdict.classification(), EventType::TrainingQuery);
        assert_eq!(verdict.property(keys::DENSITY), Some(&PropertyValue::Real(0.3)));
    }
}
