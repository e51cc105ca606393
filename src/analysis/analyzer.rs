use std::cmp::Ordering;

use crate::analysis::{
    config::AnalyzerConfig, fractures::scan_fractures, layering::detect_layering, Axis,
};
use crate::db::models::{
    measurement::z_std_dev, BoundingBox, DepthMeasurement, DepthPoint, GeoFeatures, GrainSize,
    SurfaceTexture,
};

/// Deterministic geometric-to-geological classification.
#[derive(Debug, Clone, Default)]
pub struct DepthFeatureAnalyzer {
    config: AnalyzerConfig,
}

impl DepthFeatureAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classifies a measurement. Total: sparse or degenerate captures give
    /// `GeoFeatures::indeterminate()` instead of an error. Non-finite points
    /// are ignored.
    pub fn analyze(&self, measurement: &DepthMeasurement) -> GeoFeatures {
        let config = &self.config;

        let mut points: Vec<DepthPoint> = measurement
            .points
            .iter()
            .copied()
            .filter(DepthPoint::is_finite)
            .collect();
        if points.len() < config.min_points.max(1) {
            return GeoFeatures::indeterminate();
        }

        let bbox = effective_bounding_box(measurement, &points);
        let axis = Axis::dominant(&bbox);

        let roughness = if measurement.roughness.is_finite() && measurement.roughness >= 0.0 {
            measurement.roughness
        } else {
            z_std_dev(&points)
        };

        let surface_texture = self.classify_texture(roughness);
        let grain_size = self.classify_grain(roughness, &bbox, points.len());
        let layering = detect_layering(&points, &bbox, axis, config);

        points.sort_by(|a, b| compare_along(axis, a, b));
        let fracture_scan = scan_fractures(&points, config);

        let estimated_hardness = self.estimate_hardness(
            roughness,
            fracture_scan.discontinuity_ratio,
            surface_texture,
            fracture_scan.fractures,
        );

        GeoFeatures {
            surface_texture,
            grain_size,
            layering,
            fractures: fracture_scan.fractures,
            fracture_severity: fracture_scan.severity,
            estimated_hardness,
        }
    }

    fn classify_texture(&self, roughness: f64) -> SurfaceTexture {
        let config = &self.config;
        if roughness > config.weathered_threshold {
            SurfaceTexture::Weathered
        } else if roughness > config.crystalline_threshold {
            SurfaceTexture::Crystalline
        } else if roughness > config.rough_threshold {
            SurfaceTexture::Rough
        } else {
            SurfaceTexture::Smooth
        }
    }

    /// Grain size scales roughness by the mean point spacing, so the same
    /// surface classifies alike at different scan densities. Without planar
    /// extent the raw roughness thresholds apply.
    fn classify_grain(&self, roughness: f64, bbox: &BoundingBox, point_count: usize) -> GrainSize {
        let config = &self.config;
        let area = bbox.planar_area();

        let (value, medium, coarse, very_coarse) = if area > 0.0 && area.is_finite() {
            let spacing = (area / point_count as f64).sqrt();
            (
                roughness / spacing,
                config.grain_medium_ratio,
                config.grain_coarse_ratio,
                config.grain_very_coarse_ratio,
            )
        } else {
            (
                roughness,
                config.grain_medium_roughness,
                config.grain_coarse_roughness,
                config.grain_very_coarse_roughness,
            )
        };

        if value > very_coarse {
            GrainSize::VeryCoarse
        } else if value > coarse {
            GrainSize::Coarse
        } else if value > medium {
            GrainSize::Medium
        } else {
            GrainSize::Fine
        }
    }

    /// Weighted blend of low roughness and surface regularity, scaled to
    /// [0, 10] and rounded to one decimal.
    fn estimate_hardness(
        &self,
        roughness: f64,
        discontinuity_ratio: f64,
        texture: SurfaceTexture,
        fractures: u32,
    ) -> f64 {
        let config = &self.config;
        let roughness_score =
            1.0 - (roughness / config.hardness_roughness_ceiling).clamp(0.0, 1.0);
        let regularity =
            1.0 - (discontinuity_ratio / config.hardness_regularity_ceiling).clamp(0.0, 1.0);

        let weight_total = config.weight_roughness + config.weight_regularity;
        let blended = if weight_total > 0.0 {
            (config.weight_roughness * roughness_score + config.weight_regularity * regularity)
                / weight_total
        } else {
            0.5
        };

        let mut hardness = 10.0 * blended;
        if texture == SurfaceTexture::Crystalline {
            hardness += 1.0;
        }
        if fractures > 5 {
            hardness -= 1.0;
        }

        let hardness = hardness.clamp(0.0, 10.0);
        (hardness * 10.0).round() / 10.0
    }
}

/// The measurement's own box when it is usable, otherwise one rebuilt from
/// the finite points.
fn effective_bounding_box(measurement: &DepthMeasurement, points: &[DepthPoint]) -> BoundingBox {
    let b = measurement.bounding_box;
    let finite = [b.min_x, b.max_x, b.min_y, b.max_y, b.min_z, b.max_z]
        .iter()
        .all(|v| v.is_finite());
    if finite && b.max_x >= b.min_x && b.max_y >= b.min_y && b.planar_area() > 0.0 {
        b
    } else {
        BoundingBox::from_points(points).unwrap_or_default()
    }
}

fn compare_along(axis: Axis, a: &DepthPoint, b: &DepthPoint) -> Ordering {
    axis.coord(a)
        .total_cmp(&axis.coord(b))
        .then_with(|| axis.cross_coord(a).total_cmp(&axis.cross_coord(b)))
        .then_with(|| a.z.total_cmp(&b.z))
}
