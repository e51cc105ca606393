use crate::analysis::config::AnalyzerConfig;
use crate::analysis::Axis;
use crate::db::models::{BoundingBox, DepthPoint};

#[derive(Debug, Clone, Copy, Default)]
struct Slice {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl Slice {
    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn variance(&self) -> f64 {
        let mean = self.mean();
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0)
    }
}

/// Detects banding along the dominant horizontal axis.
///
/// Points are binned into slices; the slice-mean z profile is detrended and
/// layering is reported when that profile explains a large share of the z
/// variance and oscillates (repeated sign changes), rather than being a
/// single ramp or step.
pub fn detect_layering(
    points: &[DepthPoint],
    bbox: &BoundingBox,
    axis: Axis,
    config: &AnalyzerConfig,
) -> bool {
    let slices_n = config.layering_slices.max(1);
    let (min, extent) = match axis {
        Axis::X => (bbox.min_x, bbox.extent_x()),
        Axis::Y => (bbox.min_y, bbox.extent_y()),
    };
    if extent <= 0.0 || !extent.is_finite() {
        return false;
    }

    let mut slices = vec![Slice::default(); slices_n];
    for p in points {
        let coord = axis.coord(p);
        let index = (((coord - min) / extent) * slices_n as f64).floor();
        let index = (index.max(0.0) as usize).min(slices_n - 1);
        let slice = &mut slices[index];
        slice.count += 1;
        slice.sum += p.z;
        slice.sum_sq += p.z * p.z;
    }

    let occupied: Vec<(f64, Slice)> = slices
        .into_iter()
        .enumerate()
        .filter(|(_, s)| s.count > 0)
        .map(|(i, s)| (i as f64, s))
        .collect();
    if occupied.len() < config.layering_min_occupied_slices.max(2) {
        return false;
    }

    let residuals = detrend(&occupied);
    let between = residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64;

    let total_count: usize = occupied.iter().map(|(_, s)| s.count).sum();
    let within = occupied
        .iter()
        .map(|(_, s)| s.variance() * s.count as f64)
        .sum::<f64>()
        / total_count as f64;

    if between + within <= f64::EPSILON {
        return false;
    }
    let ratio = between / (between + within);

    ratio >= config.layering_variance_ratio
        && sign_changes(&residuals) >= config.layering_min_crossings
}

/// Residuals of the slice means after removing a least-squares line.
fn detrend(occupied: &[(f64, Slice)]) -> Vec<f64> {
    let n = occupied.len() as f64;
    let mean_x = occupied.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = occupied.iter().map(|(_, s)| s.mean()).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (x, s) in occupied {
        cov += (x - mean_x) * (s.mean() - mean_y);
        var_x += (x - mean_x).powi(2);
    }
    let slope = if var_x > 0.0 { cov / var_x } else { 0.0 };

    occupied
        .iter()
        .map(|(x, s)| s.mean() - (mean_y + slope * (x - mean_x)))
        .collect()
}

fn sign_changes(values: &[f64]) -> usize {
    let mut changes = 0;
    let mut last_sign = 0.0;
    for v in values {
        if *v == 0.0 {
            continue;
        }
        let sign = v.signum();
        if last_sign != 0.0 && sign != last_sign {
            changes += 1;
        }
        last_sign = sign;
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(z: impl Fn(f64, f64) -> f64) -> Vec<DepthPoint> {
        let mut points = Vec::new();
        for i in 0..120 {
            for j in 0..20 {
                let x = i as f64 * 0.2 / 119.0;
                let y = j as f64 * 0.05 / 19.0;
                points.push(DepthPoint::new(x, y, z(x, y)));
            }
        }
        points
    }

    #[test]
    fn banded_surface_is_layered() {
        let points = grid(|x, _| 0.01 * (2.0 * std::f64::consts::PI * x / 0.1).sin());
        let bbox = BoundingBox::from_points(&points).unwrap();
        assert!(detect_layering(&points, &bbox, Axis::X, &AnalyzerConfig::default()));
    }

    #[test]
    fn ramp_is_not_layered() {
        let points = grid(|x, _| 0.05 * x);
        let bbox = BoundingBox::from_points(&points).unwrap();
        assert!(!detect_layering(&points, &bbox, Axis::X, &AnalyzerConfig::default()));
    }

    #[test]
    fn flat_surface_is_not_layered() {
        let points = grid(|_, _| 0.0);
        let bbox = BoundingBox::from_points(&points).unwrap();
        assert!(!detect_layering(&points, &bbox, Axis::X, &AnalyzerConfig::default()));
    }

    #[test]
    fn counts_sign_changes_skipping_zeros() {
        assert_eq!(sign_changes(&[1.0, 0.0, -1.0, -2.0, 3.0]), 2);
        assert_eq!(sign_changes(&[]), 0);
    }
}
