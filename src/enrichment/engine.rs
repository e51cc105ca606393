use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::ReferenceCatalog;
use crate::db::models::{
    EnhancedDetection, GeoFeatures, GeologicalContext, MineralClass, MineralDetection,
    ReferenceMatch, RockType, SurfaceTexture, WeatheringLevel,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Detections below this confidence are kept on the record but do not
    /// drive rock-type inference.
    pub min_detection_confidence: f64,
    /// Estimated hardness at or above which a hard, unlayered silicate
    /// assemblage reads as igneous.
    pub igneous_min_hardness: f64,
    pub igneous_min_silicate_fraction: f64,
    /// Fracture count that moves weathered surfaces from moderate to high.
    pub heavy_fracture_count: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.3,
            igneous_min_hardness: 6.0,
            igneous_min_silicate_fraction: 0.6,
            heavy_fracture_count: 5,
        }
    }
}

/// Turns raw detections and field metadata into a structured record.
/// Everything here is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct EnrichmentEngine {
    catalog: Arc<ReferenceCatalog>,
    config: EnrichmentConfig,
}

impl Default for EnrichmentEngine {
    fn default() -> Self {
        Self::new(Arc::new(ReferenceCatalog::builtin()), EnrichmentConfig::default())
    }
}

impl EnrichmentEngine {
    pub fn new(catalog: Arc<ReferenceCatalog>, config: EnrichmentConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    /// Attaches reference data when the name resolves; otherwise passes the
    /// detection through as `Unmatched`. Never fails.
    pub fn enhance_detection(&self, raw: &MineralDetection) -> EnhancedDetection {
        let confidence = if raw.confidence.is_finite() {
            raw.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let reference = match self.catalog.lookup(&raw.name) {
            Some(mineral) => ReferenceMatch::Matched {
                canonical_name: mineral.name.to_string(),
                mineral_class: mineral.class,
                composition: mineral.composition_map(),
                properties: mineral.properties(),
                significance: mineral.significance.to_string(),
            },
            None => ReferenceMatch::Unmatched,
        };

        EnhancedDetection {
            name: raw.name.clone(),
            confidence,
            reference,
        }
    }

    pub fn enhance_all(&self, raw: &[MineralDetection]) -> Vec<EnhancedDetection> {
        raw.iter().map(|d| self.enhance_detection(d)).collect()
    }

    /// Reconciles detections, depth-derived features and the declared rock
    /// metadata. Disagreements become advisory notes.
    pub fn analyze_context(
        &self,
        detections: &[EnhancedDetection],
        features: Option<&GeoFeatures>,
        declared_rock_type: RockType,
        declared_weathering: WeatheringLevel,
    ) -> GeologicalContext {
        let config = &self.config;
        let sparse_scan = features.is_some_and(GeoFeatures::is_indeterminate);
        let features = features.filter(|f| !f.is_indeterminate());

        let considered: Vec<&EnhancedDetection> = detections
            .iter()
            .filter(|d| d.is_matched() && d.confidence >= config.min_detection_confidence)
            .collect();
        let names: HashSet<String> = considered
            .iter()
            .filter_map(|d| d.canonical_name())
            .map(|n| n.to_lowercase())
            .collect();
        let has = |name: &str| names.contains(name);

        let silicate_fraction = silicate_fraction(&considered);
        let layering = features.map(|f| f.layering).unwrap_or(false);
        let hardness = features.map(|f| f.estimated_hardness);

        let inferred_rock_type = if layering && has("mica") && has("quartz") {
            RockType::Metamorphic
        } else if has("calcite") {
            RockType::Sedimentary
        } else if has("quartz") && has("feldspar") && has("mica") {
            RockType::Igneous
        } else if hardness.is_some_and(|h| h >= config.igneous_min_hardness)
            && !layering
            && silicate_fraction.is_some_and(|s| s >= config.igneous_min_silicate_fraction)
        {
            RockType::Igneous
        } else {
            RockType::Unknown
        };

        let formation = self.catalog.formation_for(inferred_rock_type);
        let assessed_weathering = features.map(|f| self.assess_weathering(f));

        let mut notes = Vec::new();
        if declared_rock_type != RockType::Unknown
            && inferred_rock_type != RockType::Unknown
            && declared_rock_type != inferred_rock_type
        {
            notes.push(format!(
                "Declared {} rock but detections and surface features suggest {}",
                declared_rock_type.as_str(),
                inferred_rock_type.as_str()
            ));
        }
        if let Some(assessed) = assessed_weathering {
            if declared_weathering.rank().abs_diff(assessed.rank()) > 1 {
                notes.push(format!(
                    "Declared weathering {} differs from surface assessment {}",
                    declared_weathering.as_str(),
                    assessed.as_str()
                ));
            }
        }
        if sparse_scan {
            notes.push("Depth scan too sparse to classify the surface".to_string());
        }
        for detection in detections.iter().filter(|d| !d.is_matched()) {
            notes.push(format!("No reference data for {}", detection.name));
        }

        let summary = summarize(
            inferred_rock_type,
            formation.map(|f| (f.name, f.age)),
            detections,
            features,
        );

        GeologicalContext {
            declared_rock_type,
            inferred_rock_type,
            formation: formation.map(|f| f.name.to_string()),
            estimated_age: formation.map(|f| f.age.to_string()),
            declared_weathering,
            assessed_weathering,
            silicate_fraction,
            notes,
            summary,
        }
    }

    fn assess_weathering(&self, features: &GeoFeatures) -> WeatheringLevel {
        match features.surface_texture {
            SurfaceTexture::Smooth | SurfaceTexture::Crystalline => WeatheringLevel::Fresh,
            SurfaceTexture::Rough => WeatheringLevel::Slight,
            SurfaceTexture::Weathered if features.fractures > self.config.heavy_fracture_count => {
                WeatheringLevel::High
            }
            SurfaceTexture::Weathered => WeatheringLevel::Moderate,
            // analyze_context filters indeterminate features out first.
            SurfaceTexture::Indeterminate => WeatheringLevel::Moderate,
        }
    }
}

/// Confidence-weighted share of silicates among matched detections.
fn silicate_fraction(considered: &[&EnhancedDetection]) -> Option<f64> {
    let total: f64 = considered.iter().map(|d| d.confidence).sum();
    if total <= 0.0 {
        return None;
    }
    let silicate: f64 = considered
        .iter()
        .filter(|d| d.mineral_class() == Some(MineralClass::Silicate))
        .map(|d| d.confidence)
        .sum();
    Some(silicate / total)
}

fn summarize(
    rock_type: RockType,
    formation: Option<(&str, &str)>,
    detections: &[EnhancedDetection],
    features: Option<&GeoFeatures>,
) -> String {
    let mut parts = Vec::new();

    parts.push(match (rock_type, formation) {
        (RockType::Unknown, _) => "Rock type undetermined".to_string(),
        (rock, Some((name, age))) => format!("Inferred {} ({name}, {age})", rock.as_str()),
        (rock, None) => format!("Inferred {}", rock.as_str()),
    });

    let matched = detections.iter().filter(|d| d.is_matched()).count();
    parts.push(format!(
        "{matched} of {} detections matched reference data",
        detections.len()
    ));

    if let Some(f) = features {
        parts.push(format!(
            "surface {:?}, grain {:?}, {} fractures, hardness ~{:.1}",
            f.surface_texture, f.grain_size, f.fractures, f.estimated_hardness
        ));
    }

    parts.join("; ")
}
