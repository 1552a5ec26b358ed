//! Parameter grid generation.
//!
//! Grid search is deterministic given the same bounds/steps and avoids the
//! local minima a gradient-style search can fall into. With a handful of
//! parameters a modest grid is cheap enough to use as a starting point for a
//! local refinement.

use crate::domain::Bounds;
use crate::error::AnalysisError;

/// How points are spread inside each interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    Linear,
    /// Log-spaced; requires strictly positive bounds.
    Log,
}

/// `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn linear_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AnalysisError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AnalysisError::InvalidConfig(format!(
            "invalid grid range: min={min}, max={max} (must be finite and max>min)"
        )));
    }
    if steps < 2 {
        return Err(AnalysisError::InvalidConfig("grid steps must be >= 2".to_string()));
    }
    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps)
        .map(|i| if i + 1 == steps { max } else { min + step * i as f64 })
        .collect())
}

/// `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AnalysisError> {
    if !(min > 0.0 && max > 0.0) {
        return Err(AnalysisError::InvalidConfig(format!(
            "invalid log grid range: min={min}, max={max} (must be >0)"
        )));
    }
    let exps = linear_space(min.ln(), max.ln(), steps)?;
    let mut out: Vec<f64> = exps.into_iter().map(f64::exp).collect();
    // Pin endpoints exactly.
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

/// Cartesian product of per-parameter axes, last parameter varying fastest.
///
/// A degenerate interval (`lower == upper`) contributes its single value.
pub fn parameter_grid(
    bounds: &[Bounds],
    steps: usize,
    spacing: Spacing,
) -> Result<Vec<Vec<f64>>, AnalysisError> {
    if bounds.is_empty() {
        return Err(AnalysisError::InvalidConfig("grid needs at least one parameter".to_string()));
    }
    let mut axes = Vec::with_capacity(bounds.len());
    for b in bounds {
        let axis = if b.lower == b.upper {
            vec![b.lower]
        } else {
            match spacing {
                Spacing::Linear => linear_space(b.lower, b.upper, steps)?,
                Spacing::Log => log_space(b.lower, b.upper, steps)?,
            }
        };
        axes.push(axis);
    }

    let mut out: Vec<Vec<f64>> = vec![Vec::with_capacity(bounds.len())];
    for axis in &axes {
        let mut next = Vec::with_capacity(out.len() * axis.len());
        for prefix in &out {
            for &v in axis {
                let mut point = prefix.clone();
                point.push(v);
                next.push(point);
            }
        }
        out = next;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_include_endpoints() {
        let v = linear_space(0.0, 10.0, 5).unwrap();
        assert_eq!(v, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert_eq!(v[0], 0.1);
        assert_eq!(v[4], 10.0);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!(log_space(0.0, 10.0, 5).is_err());
        assert!(linear_space(1.0, 1.0, 5).is_err());
        assert!(linear_space(0.0, 1.0, 1).is_err());
    }

    #[test]
    fn grid_is_cartesian_product() {
        let bounds = [
            Bounds { lower: 0.0, upper: 1.0 },
            Bounds { lower: 2.0, upper: 2.0 },
            Bounds { lower: -1.0, upper: 1.0 },
        ];
        let grid = parameter_grid(&bounds, 3, Spacing::Linear).unwrap();
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0], vec![0.0, 2.0, -1.0]);
        assert_eq!(grid[1], vec![0.0, 2.0, 0.0]);
        assert_eq!(grid[8], vec![1.0, 2.0, 1.0]);
    }
}
