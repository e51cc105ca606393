use crate::analysis::config::AnalyzerConfig;
use crate::db::models::{DepthPoint, FractureSeverity};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractureScan {
    pub fractures: u32,
    pub severity: FractureSeverity,
    /// Discontinuities per interior point, in [0, 1].
    pub discontinuity_ratio: f64,
}

/// Walks the points in scan order and flags a discontinuity wherever a point
/// is separated from both neighbours by more than `fracture_step`.
///
/// `ordered` must already be sorted along the dominant axis.
pub fn scan_fractures(ordered: &[DepthPoint], config: &AnalyzerConfig) -> FractureScan {
    if ordered.len() < 3 {
        return FractureScan {
            fractures: 0,
            severity: FractureSeverity::None,
            discontinuity_ratio: 0.0,
        };
    }

    let step = config.fracture_step;
    let mut discontinuities: u32 = 0;
    let mut magnitude = 0.0;

    for window in ordered.windows(3) {
        let before = (window[1].z - window[0].z).abs();
        let after = (window[2].z - window[1].z).abs();
        if before > step && after > step {
            discontinuities += 1;
            magnitude += (before + after) / 2.0;
        }
    }

    let fractures = discontinuities / config.fracture_normalizer.max(1);
    let severity = if discontinuities == 0 {
        FractureSeverity::None
    } else {
        let mean = magnitude / discontinuities as f64;
        if fractures == 0 || mean < 2.0 * step {
            FractureSeverity::Minor
        } else if mean < 4.0 * step {
            FractureSeverity::Moderate
        } else {
            FractureSeverity::Severe
        }
    };

    FractureScan {
        fractures,
        severity,
        discontinuity_ratio: discontinuities as f64 / (ordered.len() - 2) as f64,
    }
}
