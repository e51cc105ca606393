//! Depth measurement and derived geometric features.
//!
//! A `DepthMeasurement` is produced once by the depth-capture collaborator
//! (LiDAR or photogrammetry) and treated as opaque input. `GeoFeatures` is a
//! pure function of it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepthPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: Option<f64>,
}

impl DepthPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            intensity: None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl BoundingBox {
    /// Tight box around the finite points, or `None` when there are none.
    pub fn from_points(points: &[DepthPoint]) -> Option<Self> {
        let mut finite = points.iter().filter(|p| p.is_finite());
        let first = finite.next()?;
        let mut bbox = Self {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
            min_z: first.z,
            max_z: first.z,
        };
        for p in finite {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_y = bbox.max_y.max(p.y);
            bbox.min_z = bbox.min_z.min(p.z);
            bbox.max_z = bbox.max_z.max(p.z);
        }
        Some(bbox)
    }

    pub fn extent_x(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn extent_y(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }

    pub fn extent_z(&self) -> f64 {
        (self.max_z - self.min_z).max(0.0)
    }

    pub fn planar_area(&self) -> f64 {
        self.extent_x() * self.extent_y()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepthMeasurement {
    pub points: Vec<DepthPoint>,
    pub surface_area: f64,
    pub volume: f64,
    pub roughness: f64,
    pub bounding_box: BoundingBox,
}

impl DepthMeasurement {
    /// Builds a measurement from a raw point cloud, deriving the box, the
    /// bounding volume and the RMS roughness of the z channel.
    pub fn from_points(points: Vec<DepthPoint>, surface_area: f64) -> Self {
        let bounding_box = BoundingBox::from_points(&points).unwrap_or_default();
        let volume = bounding_box.extent_x() * bounding_box.extent_y() * bounding_box.extent_z();
        let roughness = z_std_dev(&points);
        Self {
            points,
            surface_area,
            volume,
            roughness,
            bounding_box,
        }
    }

    pub fn is_finite(&self) -> bool {
        let b = &self.bounding_box;
        self.points
            .iter()
            .all(|p| p.is_finite() && p.intensity.map_or(true, f64::is_finite))
            && [self.surface_area, self.volume, self.roughness]
                .iter()
                .chain([b.min_x, b.max_x, b.min_y, b.max_y, b.min_z, b.max_z].iter())
                .all(|v| v.is_finite())
    }

    /// Drops non-finite points and rederives any non-finite metric from the
    /// remaining ones. JSON has no encoding for NaN or infinity, so nothing
    /// non-finite may reach the store.
    pub fn sanitized(mut self) -> Self {
        if self.is_finite() {
            return self;
        }

        self.points.retain(DepthPoint::is_finite);
        for point in &mut self.points {
            point.intensity = point.intensity.filter(|i| i.is_finite());
        }

        let b = self.bounding_box;
        let box_finite = [b.min_x, b.max_x, b.min_y, b.max_y, b.min_z, b.max_z]
            .iter()
            .all(|v| v.is_finite());
        if !box_finite {
            self.bounding_box = BoundingBox::from_points(&self.points).unwrap_or_default();
        }
        if !self.volume.is_finite() {
            let b = self.bounding_box;
            self.volume = b.extent_x() * b.extent_y() * b.extent_z();
        }
        if !self.roughness.is_finite() {
            self.roughness = z_std_dev(&self.points);
        }
        if !self.surface_area.is_finite() {
            self.surface_area = self.bounding_box.planar_area();
        }
        self
    }
}

/// Population standard deviation of z over the finite points.
pub fn z_std_dev(points: &[DepthPoint]) -> f64 {
    let zs: Vec<f64> = points.iter().filter(|p| p.is_finite()).map(|p| p.z).collect();
    if zs.len() < 2 {
        return 0.0;
    }
    let mean = zs.iter().sum::<f64>() / zs.len() as f64;
    let variance = zs.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / zs.len() as f64;
    variance.sqrt()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceTexture {
    Smooth,
    Rough,
    Crystalline,
    Weathered,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GrainSize {
    Fine,
    Medium,
    Coarse,
    VeryCoarse,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FractureSeverity {
    None,
    Minor,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoFeatures {
    pub surface_texture: SurfaceTexture,
    pub grain_size: GrainSize,
    pub layering: bool,
    pub fractures: u32,
    pub fracture_severity: FractureSeverity,
    /// Mohs-like estimate in [0, 10]; 0 when indeterminate.
    pub estimated_hardness: f64,
}

impl GeoFeatures {
    /// Feature set for captures too sparse to classify.
    pub fn indeterminate() -> Self {
        Self {
            surface_texture: SurfaceTexture::Indeterminate,
            grain_size: GrainSize::Indeterminate,
            layering: false,
            fractures: 0,
            fracture_severity: FractureSeverity::None,
            estimated_hardness: 0.0,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.surface_texture == SurfaceTexture::Indeterminate
    }
}
