use serde::{Deserialize, Serialize};

use super::{RockType, WeatheringLevel};

/// Summary reconciling detections, depth-derived features and the rock
/// metadata declared in the field. Produced once, at save time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeologicalContext {
    pub declared_rock_type: RockType,
    pub inferred_rock_type: RockType,
    pub formation: Option<String>,
    pub estimated_age: Option<String>,
    pub declared_weathering: WeatheringLevel,
    pub assessed_weathering: Option<WeatheringLevel>,
    /// Confidence-weighted share of silicate detections, when any detection
    /// had reference data.
    pub silicate_fraction: Option<f64>,
    /// Advisory notes; mismatches are reported here, never as errors.
    pub notes: Vec<String>,
    pub summary: String,
}

impl GeologicalContext {
    pub fn has_advisories(&self) -> bool {
        !self.notes.is_empty()
    }
}
