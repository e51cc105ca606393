use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    DepthMeasurement, ImageRef, Location, MineralDetection, RockType, WeatheringLevel,
};

/// Everything the host collected for one observation, before enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureDraft {
    /// Set by the host only when it re-submits a draft it already tried.
    pub id: Option<String>,
    /// Defaults to the time the draft is prepared.
    pub captured_at: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub image: Option<ImageRef>,
    pub depth_measurement: Option<DepthMeasurement>,
    pub detections: Vec<MineralDetection>,
    pub field_notes: Option<String>,
    pub rock_type: RockType,
    pub weathering_level: WeatheringLevel,
}

impl CaptureDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64, elevation: Option<f64>) -> Self {
        self.location = Some(Location {
            latitude,
            longitude,
            elevation,
        });
        self
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_measurement(mut self, measurement: DepthMeasurement) -> Self {
        self.depth_measurement = Some(measurement);
        self
    }

    pub fn with_detection(mut self, name: impl Into<String>, confidence: f64) -> Self {
        self.detections.push(MineralDetection::new(name, confidence));
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.field_notes = Some(notes.into());
        self
    }

    pub fn with_rock(mut self, rock_type: RockType, weathering_level: WeatheringLevel) -> Self {
        self.rock_type = rock_type;
        self.weathering_level = weathering_level;
        self
    }
}
