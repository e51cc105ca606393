use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A detection as it leaves the classifier: a name and a score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MineralDetection {
    pub name: String,
    pub confidence: f64,
}

impl MineralDetection {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MineralClass {
    Silicate,
    Carbonate,
    Sulfide,
    Oxide,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MineralProperties {
    pub density: f64,
    pub hardness: f64,
    pub color: String,
    pub luster: String,
    pub crystal_system: String,
}

/// Outcome of a reference lookup. A miss is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reference", rename_all = "camelCase")]
pub enum ReferenceMatch {
    #[serde(rename_all = "camelCase")]
    Matched {
        canonical_name: String,
        mineral_class: MineralClass,
        /// Element symbol to weight percentage.
        composition: BTreeMap<String, f64>,
        properties: MineralProperties,
        significance: String,
    },
    #[serde(rename = "none")]
    Unmatched,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedDetection {
    pub name: String,
    pub confidence: f64,
    pub reference: ReferenceMatch,
}

impl EnhancedDetection {
    pub fn is_matched(&self) -> bool {
        matches!(self.reference, ReferenceMatch::Matched { .. })
    }

    pub fn canonical_name(&self) -> Option<&str> {
        match &self.reference {
            ReferenceMatch::Matched { canonical_name, .. } => Some(canonical_name),
            ReferenceMatch::Unmatched => None,
        }
    }

    pub fn mineral_class(&self) -> Option<MineralClass> {
        match &self.reference {
            ReferenceMatch::Matched { mineral_class, .. } => Some(*mineral_class),
            ReferenceMatch::Unmatched => None,
        }
    }

    pub fn composition(&self) -> Option<&BTreeMap<String, f64>> {
        match &self.reference {
            ReferenceMatch::Matched { composition, .. } => Some(composition),
            ReferenceMatch::Unmatched => None,
        }
    }
}
