pub mod analyzer;
pub mod config;
pub mod fractures;
pub mod layering;

pub use analyzer::DepthFeatureAnalyzer;
pub use config::AnalyzerConfig;

use crate::db::models::{BoundingBox, DepthPoint};

/// Horizontal axis a scan is walked along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// The longer horizontal extent of the box; ties go to X.
    pub fn dominant(bbox: &BoundingBox) -> Self {
        if bbox.extent_x() >= bbox.extent_y() {
            Axis::X
        } else {
            Axis::Y
        }
    }

    pub fn coord(&self, p: &DepthPoint) -> f64 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }

    pub fn cross_coord(&self, p: &DepthPoint) -> f64 {
        match self {
            Axis::X => p.y,
            Axis::Y => p.x,
        }
    }
}
