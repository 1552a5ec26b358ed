//! Synthetic observations from simulated trajectories.
//!
//! Fit workflows are exercised against "observed" data made by simulating a
//! model with known parameters and perturbing every value with seeded
//! Gaussian noise. The same seed always produces the same observations.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::debug;

use crate::domain::Trajectory;
use crate::error::AnalysisError;

/// Copy of `trajectory` with `N(0, noise_std)` added to every value.
///
/// `noise_std == 0` returns an exact copy.
pub fn observe_with_noise(
    trajectory: &Trajectory,
    noise_std: f64,
    seed: u64,
) -> Result<Trajectory, AnalysisError> {
    if !(noise_std.is_finite() && noise_std >= 0.0) {
        return Err(AnalysisError::InvalidConfig(format!(
            "noise standard deviation must be finite and >= 0 (got {noise_std})"
        )));
    }
    if noise_std == 0.0 {
        return Ok(trajectory.clone());
    }

    let normal = Normal::new(0.0, noise_std)
        .map_err(|e| AnalysisError::InvalidConfig(format!("noise distribution: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let values = trajectory.values().map(|v| v + normal.sample(&mut rng));
    debug!(noise_std, seed, samples = trajectory.len(), "added observation noise");

    Trajectory::new(
        trajectory.times().to_vec(),
        trajectory.variable_names().to_vec(),
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeWindow;
    use crate::models::{AnalyticModel, Simulator, catalog};

    fn clean() -> Trajectory {
        let window = TimeWindow::new(0.0, 10.0, 200).unwrap();
        AnalyticModel::load(&catalog::linear_pathway())
            .unwrap()
            .simulate(&window)
            .unwrap()
    }

    #[test]
    fn noise_is_seeded_and_centred() {
        let traj = clean();
        let a = observe_with_noise(&traj, 0.1, 7).unwrap();
        let b = observe_with_noise(&traj, 0.1, 7).unwrap();
        let c = observe_with_noise(&traj, 0.1, 8).unwrap();
        assert_eq!(a.values(), b.values());
        assert_ne!(a.values(), c.values());
        assert_eq!(a.times(), traj.times());

        let diff = a.values() - traj.values();
        let n = diff.len() as f64;
        let mean = diff.sum() / n;
        let std = (diff.norm_squared() / n - mean * mean).sqrt();
        assert!(mean.abs() < 0.02, "mean={mean}");
        assert!((std - 0.1).abs() < 0.02, "std={std}");
    }

    #[test]
    fn zero_noise_is_identity_and_negative_is_rejected() {
        let traj = clean();
        assert_eq!(observe_with_noise(&traj, 0.0, 1).unwrap(), traj);
        assert!(observe_with_noise(&traj, -1.0, 1).is_err());
        assert!(observe_with_noise(&traj, f64::NAN, 1).is_err());
    }
}
