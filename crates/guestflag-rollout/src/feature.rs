//! Features and their typed variations.
//!
//! # Purpose
//! A feature is a named, ordered set of variations. Each variation carries one
//! typed value; evaluation hands that value back to the caller unchanged.
//!
//! # Key invariants
//! - Variation names are unique within a feature.
//! - A feature has at least one variation.
//! - The default variation is the declared one, or the first variation when
//!   none is declared.
//!
//! # Examples
//! ```rust
//! use guestflag_rollout::{Feature, Variation, VariationValue};
//!
//! let feature = Feature::new(
//!     "TestFeature",
//!     vec![
//!         Variation::new("FeatureEnabled", VariationValue::Bool(true)),
//!         Variation::new("FeatureDisabled", VariationValue::Bool(false)),
//!     ],
//! )
//! .with_default("FeatureDisabled");
//! assert!(feature.validate().is_ok());
//! assert_eq!(feature.default_variation().unwrap().name, "FeatureDisabled");
//! ```
use crate::{RolloutError, RolloutResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Typed value served for a variation.
///
/// Serialized in the externally tagged form (`{"boolValue": true}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariationValue {
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "longValue")]
    Long(i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
}

impl VariationValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariationValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            VariationValue::Bool(_) => "bool",
            VariationValue::String(_) => "string",
            VariationValue::Long(_) => "long",
            VariationValue::Double(_) => "double",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    pub value: VariationValue,
}

impl Variation {
    pub fn new(name: impl Into<String>, value: VariationValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub variations: Vec<Variation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_variation: Option<String>,
}

impl Feature {
    pub fn new(name: impl Into<String>, variations: Vec<Variation>) -> Self {
        Self {
            name: name.into(),
            variations,
            default_variation: None,
        }
    }

    pub fn with_default(mut self, variation: impl Into<String>) -> Self {
        self.default_variation = Some(variation.into());
        self
    }

    pub fn variation(&self, name: &str) -> Option<&Variation> {
        self.variations.iter().find(|variation| variation.name == name)
    }

    pub fn default_variation(&self) -> Option<&Variation> {
        match &self.default_variation {
            Some(name) => self.variation(name),
            None => self.variations.first(),
        }
    }

    pub fn validate(&self) -> RolloutResult<()> {
        if self.variations.is_empty() {
            return Err(RolloutError::NoVariations(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for variation in &self.variations {
            if !seen.insert(variation.name.as_str()) {
                return Err(RolloutError::DuplicateVariation(variation.name.clone()));
            }
        }
        if let Some(name) = &self.default_variation
            && self.variation(name).is_none()
        {
            return Err(RolloutError::UnknownVariation(name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> Feature {
        Feature::new(
            "TestFeature",
            vec![
                Variation::new("FeatureEnabled", VariationValue::Bool(true)),
                Variation::new("FeatureDisabled", VariationValue::Bool(false)),
            ],
        )
    }

    #[test]
    fn default_falls_back_to_first_variation() {
        let feature = flag();
        assert_eq!(
            feature.default_variation().map(|v| v.name.as_str()),
            Some("FeatureEnabled")
        );
        let feature = feature.with_default("FeatureDisabled");
        assert_eq!(
            feature.default_variation().map(|v| v.value.clone()),
            Some(VariationValue::Bool(false))
        );
    }

    #[test]
    fn validate_rejects_empty_duplicate_and_unknown_default() {
        assert_eq!(
            Feature::new("F", vec![]).validate(),
            Err(RolloutError::NoVariations("F".to_string()))
        );

        let mut duplicate = flag();
        duplicate
            .variations
            .push(Variation::new("FeatureEnabled", VariationValue::Bool(false)));
        assert!(matches!(
            duplicate.validate(),
            Err(RolloutError::DuplicateVariation(_))
        ));

        assert!(matches!(
            flag().with_default("Missing").validate(),
            Err(RolloutError::UnknownVariation(_))
        ));
    }

    #[test]
    fn values_serialize_with_type_tags() {
        let json = serde_json::to_value(VariationValue::Bool(true)).expect("serialize");
        assert_eq!(json, serde_json::json!({ "boolValue": true }));
        let json = serde_json::to_value(VariationValue::Long(7)).expect("serialize");
        assert_eq!(json, serde_json::json!({ "longValue": 7 }));
        assert_eq!(VariationValue::String("x".into()).as_bool(), None);
        assert_eq!(VariationValue::Double(0.5).type_name(), "double");
    }
}
