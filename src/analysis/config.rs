use serde::{Deserialize, Serialize};

/// Tunable thresholds for depth feature classification. Lengths are metres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Fewer finite points than this yields an indeterminate feature set.
    pub min_points: usize,

    /// RMS roughness above which a surface is rough / crystalline / weathered.
    pub rough_threshold: f64,
    pub crystalline_threshold: f64,
    pub weathered_threshold: f64,

    /// Grain size from roughness divided by mean point spacing.
    pub grain_medium_ratio: f64,
    pub grain_coarse_ratio: f64,
    pub grain_very_coarse_ratio: f64,

    /// Raw roughness thresholds used when the cloud has no planar extent.
    pub grain_medium_roughness: f64,
    pub grain_coarse_roughness: f64,
    pub grain_very_coarse_roughness: f64,

    /// Layering: slices along the dominant horizontal axis.
    pub layering_slices: usize,
    pub layering_min_occupied_slices: usize,
    /// Share of z variance explained by slice means.
    pub layering_variance_ratio: f64,
    /// Sign changes of the detrended slice profile.
    pub layering_min_crossings: usize,

    /// Depth step that counts as a discontinuity between neighbours.
    pub fracture_step: f64,
    /// Discontinuities per reported fracture.
    pub fracture_normalizer: u32,

    /// Hardness weights.
    pub hardness_roughness_ceiling: f64,
    pub hardness_regularity_ceiling: f64,
    pub weight_roughness: f64,
    pub weight_regularity: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_points: 3,
            rough_threshold: 0.008,
            crystalline_threshold: 0.012,
            weathered_threshold: 0.020,
            grain_medium_ratio: 3.0,
            grain_coarse_ratio: 5.0,
            grain_very_coarse_ratio: 7.5,
            grain_medium_roughness: 0.006,
            grain_coarse_roughness: 0.010,
            grain_very_coarse_roughness: 0.015,
            layering_slices: 12,
            layering_min_occupied_slices: 6,
            layering_variance_ratio: 0.35,
            layering_min_crossings: 3,
            fracture_step: 0.003,
            fracture_normalizer: 100,
            hardness_roughness_ceiling: 0.025,
            hardness_regularity_ceiling: 0.10,
            weight_roughness: 0.45,
            weight_regularity: 0.55,
        }
    }
}
