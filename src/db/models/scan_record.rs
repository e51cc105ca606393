//! Scan record data model.
//!
//! A scan record is one complete field observation. Everything except
//! `sync_status` is fixed when the record is created; the store only ever
//! swaps the status, so a sync attempt can never race a content edit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DepthMeasurement, EnhancedDetection, GeoFeatures, GeologicalContext, ReferenceMatch};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    /// Whether the record still belongs to the pending-sync set.
    pub fn needs_sync(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Failed)
    }

    /// `synced` is terminal; re-acknowledging it is allowed so a redelivered
    /// record does not trip the state machine.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        match self {
            SyncStatus::Pending | SyncStatus::Failed => true,
            SyncStatus::Synced => next == SyncStatus::Synced,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RockType {
    Igneous,
    Sedimentary,
    Metamorphic,
    #[default]
    Unknown,
}

impl RockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RockType::Igneous => "igneous",
            RockType::Sedimentary => "sedimentary",
            RockType::Metamorphic => "metamorphic",
            RockType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeatheringLevel {
    Fresh,
    Slight,
    #[default]
    Moderate,
    High,
    Extreme,
}

impl WeatheringLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatheringLevel::Fresh => "fresh",
            WeatheringLevel::Slight => "slight",
            WeatheringLevel::Moderate => "moderate",
            WeatheringLevel::High => "high",
            WeatheringLevel::Extreme => "extreme",
        }
    }

    /// Ordinal position on the fresh..extreme scale.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

/// Opaque handle to the captured image, as handed over by the camera
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageRef {
    Uri { uri: String },
    Inline { mime_type: String, bytes: Vec<u8> },
}

impl ImageRef {
    pub fn byte_len(&self) -> usize {
        match self {
            ImageRef::Uri { uri } => uri.len(),
            ImageRef::Inline { bytes, .. } => bytes.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub location: Option<Location>,
    pub image: Option<ImageRef>,
    pub depth_measurement: Option<DepthMeasurement>,
    pub geo_features: Option<GeoFeatures>,
    pub detections: Vec<EnhancedDetection>,
    pub geological_context: GeologicalContext,
    pub field_notes: Option<String>,
    pub rock_type: RockType,
    pub weathering_level: WeatheringLevel,
    pub sync_status: SyncStatus,
}

impl ScanRecord {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Whether the record carries an id the store should keep.
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Features are derived from the measurement, so one without the other
    /// means the record was assembled by hand and is inconsistent.
    pub fn features_consistent(&self) -> bool {
        self.depth_measurement.is_some() == self.geo_features.is_some()
    }

    /// Replaces every NaN or infinite number with a storable value: bad
    /// points are dropped, metrics rederived, unusable coordinates cleared.
    /// Returns whether anything changed.
    pub fn sanitize_non_finite(&mut self) -> bool {
        let mut changed = false;

        if let Some(measurement) = self.depth_measurement.take() {
            changed |= !measurement.is_finite();
            self.depth_measurement = Some(measurement.sanitized());
        }

        if let Some(location) = self.location.as_mut() {
            if location.elevation.is_some_and(|e| !e.is_finite()) {
                location.elevation = None;
                changed = true;
            }
        }
        if self
            .location
            .is_some_and(|l| !l.latitude.is_finite() || !l.longitude.is_finite())
        {
            self.location = None;
            changed = true;
        }

        if let Some(features) = self.geo_features.as_mut() {
            if !features.estimated_hardness.is_finite() {
                features.estimated_hardness = 0.0;
                changed = true;
            }
        }

        for detection in &mut self.detections {
            if !detection.confidence.is_finite() {
                detection.confidence = 0.0;
                changed = true;
            }
            if let ReferenceMatch::Matched {
                composition,
                properties,
                ..
            } = &mut detection.reference
            {
                let before = composition.len();
                composition.retain(|_, pct| pct.is_finite());
                changed |= composition.len() != before;
                for value in [&mut properties.density, &mut properties.hardness] {
                    if !value.is_finite() {
                        *value = 0.0;
                        changed = true;
                    }
                }
            }
        }

        if self
            .geological_context
            .silicate_fraction
            .is_some_and(|f| !f.is_finite())
        {
            self.geological_context.silicate_fraction = None;
            changed = true;
        }

        changed
    }
}

/// Aggregate view over the store, recomputed on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_entries: u64,
    pub pending_sync: u64,
    pub failed: u64,
    pub synced: u64,
    pub abandoned: u64,
    pub estimated_size_bytes: u64,
}

/// Upload bookkeeping kept next to a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub status: SyncStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub abandoned: bool,
}
