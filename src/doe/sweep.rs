//! One-parameter sweeps.
//!
//! A sweep perturbs a single named parameter by a list of percent changes
//! ("levels") and simulates once per level:
//!
//! ```text
//! value(level) = baseline * (1 + max(level, floor) / 100)
//! ```
//!
//! The baseline is read once, before the model is touched. Between levels the
//! model is reset, and it is reset again before returning (also on error), so
//! the caller never observes a perturbed model.

use tracing::{debug, info, warn};

use crate::domain::{TimeWindow, Trajectory};
use crate::error::AnalysisError;
use crate::models::Simulator;

/// Inputs shared by every run of a sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepSettings {
    pub window: TimeWindow,
    pub level_floor_pct: f64,
}

/// One simulated level.
#[derive(Debug, Clone)]
pub struct SweepRun {
    /// Level as requested.
    pub level: f64,
    /// Level after clamping to the floor.
    pub applied_pct: f64,
    /// Parameter value used for the run.
    pub value: f64,
    pub trajectory: Trajectory,
}

/// All runs of a sweep, in the order the levels were given.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub parameter: String,
    pub baseline_value: f64,
    pub runs: Vec<SweepRun>,
}

impl Sweep {
    /// Trajectory simulated for `level` (as requested).
    pub fn trajectory(&self, level: f64) -> Option<&Trajectory> {
        self.runs
            .iter()
            .find(|run| run.level == level)
            .map(|run| &run.trajectory)
    }

    pub fn levels(&self) -> Vec<f64> {
        self.runs.iter().map(|run| run.level).collect()
    }
}

/// Apply the level floor.
pub fn clamp_level(level: f64, floor_pct: f64) -> f64 {
    level.max(floor_pct)
}

/// Parameter value for a (clamped) percent change of `baseline`.
pub fn perturbed_value(baseline: f64, applied_pct: f64) -> f64 {
    baseline * (1.0 + 0.01 * applied_pct)
}

/// Simulate `model` once per level of `parameter`.
pub fn run_sweep<M: Simulator>(
    model: &mut M,
    parameter: &str,
    levels: &[f64],
    settings: &SweepSettings,
) -> Result<Sweep, AnalysisError> {
    if !model.has_parameter(parameter) {
        return Err(AnalysisError::UnknownParameter(parameter.to_string()));
    }
    settings.window.validate()?;
    if levels.iter().any(|l| !l.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
            "levels for '{parameter}' must be finite"
        )));
    }

    let baseline_value = model.parameter(parameter)?;
    info!(
        parameter,
        baseline_value,
        levels = levels.len(),
        "running sweep"
    );

    let runs = simulate_levels(model, parameter, baseline_value, levels, settings);
    model.reset();

    Ok(Sweep {
        parameter: parameter.to_string(),
        baseline_value,
        runs: runs?,
    })
}

fn simulate_levels<M: Simulator>(
    model: &mut M,
    parameter: &str,
    baseline_value: f64,
    levels: &[f64],
    settings: &SweepSettings,
) -> Result<Vec<SweepRun>, AnalysisError> {
    let mut runs = Vec::with_capacity(levels.len());
    for &level in levels {
        model.reset();
        let applied_pct = clamp_level(level, settings.level_floor_pct);
        if applied_pct != level {
            warn!(
                parameter,
                level,
                applied_pct,
                "level below floor; clamped"
            );
        }
        let value = perturbed_value(baseline_value, applied_pct);
        model.set_parameter(parameter, value)?;
        let trajectory = model.simulate(&settings.window)?;
        debug!(parameter, level, value, samples = trajectory.len(), "simulated level");
        runs.push(SweepRun {
            level,
            applied_pct,
            value,
            trajectory,
        });
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_LEVEL_FLOOR_PCT;
    use crate::models::{AnalyticModel, catalog};

    fn settings() -> SweepSettings {
        SweepSettings {
            window: TimeWindow::new(0.0, 10.0, 50).unwrap(),
            level_floor_pct: DEFAULT_LEVEL_FLOOR_PCT,
        }
    }

    #[test]
    fn level_zero_reproduces_baseline() {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        let baseline = model.simulate(&settings().window).unwrap();

        let sweep = run_sweep(&mut model, "k1", &[0.0], &settings()).unwrap();
        let run = sweep.trajectory(0.0).unwrap();
        assert!(run.same_grid(&baseline, 1e-12));
        let diff = (run.values() - baseline.values()).abs().max();
        assert!(diff < 1e-12, "max diff {diff}");
    }

    #[test]
    fn levels_perturb_relative_to_baseline_and_clamp() {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        model.set_parameter("k2", 2.0).unwrap();

        let sweep = run_sweep(&mut model, "k2", &[-10.0, 0.0, 50.0, -150.0], &settings()).unwrap();
        assert_eq!(sweep.baseline_value, 2.0);
        assert_eq!(sweep.levels(), vec![-10.0, 0.0, 50.0, -150.0]);

        let values: Vec<f64> = sweep.runs.iter().map(|r| r.value).collect();
        assert!((values[0] - 1.8).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((values[2] - 3.0).abs() < 1e-12);
        assert_eq!(sweep.runs[3].applied_pct, DEFAULT_LEVEL_FLOOR_PCT);
        assert_eq!(values[3], 0.0);
    }

    #[test]
    fn model_is_reset_after_sweep() {
        let mut model = AnalyticModel::load(&catalog::oscillator()).unwrap();
        let before = model.parameter("frequency").unwrap();
        run_sweep(&mut model, "frequency", &[20.0, 40.0], &settings()).unwrap();
        assert_eq!(model.parameter("frequency").unwrap(), before);
    }

    #[test]
    fn unknown_parameter_fails_before_simulating() {
        let mut model = AnalyticModel::load(&catalog::oscillator()).unwrap();
        match run_sweep(&mut model, "J1_Ki", &[0.0], &settings()) {
            Err(AnalysisError::UnknownParameter(name)) => assert_eq!(name, "J1_Ki"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn failed_run_still_resets_model() {
        // A negative rate grows without bound and eventually overflows.
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        let window = TimeWindow::new(0.0, 1e3, 10).unwrap();
        let settings = SweepSettings {
            window,
            level_floor_pct: -1e6,
        };
        let result = run_sweep(&mut model, "k1", &[0.0, -1000.0], &settings);
        assert!(matches!(result, Err(AnalysisError::Simulation(_))));
        assert_eq!(model.parameter("k1").unwrap(), 1.0);
    }
}
