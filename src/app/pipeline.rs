//! Shared command workflows.
//!
//! Each `kstudy` subcommand follows the same shape:
//! resolve model -> build window/config -> run library operation -> report.
//! The steps that touch models and files live here so `app` only handles
//! presentation and exports.

use tracing::info;

use crate::cli::{ModelArgs, WindowArgs};
use crate::data::observe_with_noise;
use crate::doe::{StudyOutcome, Sweep, SweepSettings, run_study, run_study_parallel, run_sweep};
use crate::domain::{FitConfig, StudyConfig, TimeWindow, Trajectory};
use crate::error::AppError;
use crate::fit::{FitReport, fit_parameters};
use crate::io::{read_suite, read_trajectory_csv, resolve_model};
use crate::math::peak_frequency;
use crate::models::{AnalyticBackend, AnalyticModel, ModelDefinition, Simulator};
use crate::verify::{VerificationReport, default_suite};

/// Resolve `--model` and apply `--set` overrides.
pub fn load_definition(args: &ModelArgs) -> Result<ModelDefinition, AppError> {
    let mut definition = resolve_model(&args.model)?;
    for (name, value) in &args.overrides {
        definition = definition.with_parameter(name, *value);
    }
    // Fail early on unknown override names.
    AnalyticModel::load(&definition)?;
    Ok(definition)
}

pub fn window_from_args(args: &WindowArgs) -> Result<TimeWindow, AppError> {
    Ok(TimeWindow::new(args.start, args.end, args.points)?)
}

/// Evenly spaced window with the same endpoints and length as `trajectory`.
pub fn window_covering(trajectory: &Trajectory) -> Result<TimeWindow, AppError> {
    let times = trajectory.times();
    match (times.first(), times.last()) {
        (Some(&start), Some(&end)) => Ok(TimeWindow::new(start, end, times.len())?),
        _ => Err(AppError::new(2, "Observed trajectory has no samples.")),
    }
}

pub fn run_simulation(definition: &ModelDefinition, window: &TimeWindow) -> Result<Trajectory, AppError> {
    let mut model = AnalyticModel::load(definition)?;
    Ok(model.simulate(window)?)
}

/// A sweep plus, optionally, the peak frequency of one variable per level.
#[derive(Debug, Clone)]
pub struct SweepOutput {
    pub sweep: Sweep,
    pub peaks: Option<(String, Vec<f64>)>,
}

pub fn run_sweep_command(
    definition: &ModelDefinition,
    parameter: &str,
    levels: &[f64],
    settings: &SweepSettings,
    variable: Option<&str>,
    discard_count: usize,
) -> Result<SweepOutput, AppError> {
    let mut model = AnalyticModel::load(definition)?;
    let sweep = run_sweep(&mut model, parameter, levels, settings)?;
    let peaks = match variable {
        Some(var) => {
            let values = sweep
                .runs
                .iter()
                .map(|run| peak_frequency(&run.trajectory, var, discard_count, 0))
                .collect::<Result<Vec<f64>, _>>()?;
            Some((var.to_string(), values))
        }
        None => None,
    };
    Ok(SweepOutput { sweep, peaks })
}

/// Run a study; an empty `factors` list means "every model parameter".
pub fn run_study_command(
    definition: &ModelDefinition,
    factors: &[String],
    levels: &[f64],
    variable: &str,
    baseline_factor: Option<&str>,
    config: &StudyConfig,
    parallel: bool,
) -> Result<StudyOutcome, AppError> {
    let mut model = AnalyticModel::load(definition)?;
    let factors = if factors.is_empty() {
        model.parameter_names()
    } else {
        factors.to_vec()
    };
    info!(model = %definition.name, factors = factors.len(), parallel, "starting study");

    let outcome = if parallel {
        run_study_parallel(
            &AnalyticBackend,
            definition,
            &factors,
            levels,
            variable,
            baseline_factor,
            config,
        )?
    } else {
        run_study(&mut model, &factors, levels, variable, baseline_factor, config)?
    };
    Ok(outcome)
}

/// Where fit observations come from.
#[derive(Debug, Clone)]
pub enum ObservationSource<'a> {
    /// A trajectory CSV file.
    File(&'a std::path::Path),
    /// Simulate the model with `truth` overrides on `window`, then add noise.
    Synthetic {
        truth: &'a [(String, f64)],
        window: TimeWindow,
        noise_std: f64,
        seed: u64,
    },
}

pub fn load_observations(
    definition: &ModelDefinition,
    source: &ObservationSource<'_>,
    fit_until: Option<f64>,
) -> Result<Trajectory, AppError> {
    let observed = match source {
        ObservationSource::File(path) => read_trajectory_csv(path)?,
        ObservationSource::Synthetic {
            truth,
            window,
            noise_std,
            seed,
        } => {
            let mut truth_definition = definition.clone();
            for (name, value) in truth.iter() {
                truth_definition = truth_definition.with_parameter(name, *value);
            }
            let clean = run_simulation(&truth_definition, window)?;
            observe_with_noise(&clean, *noise_std, *seed)?
        }
    };
    match fit_until {
        Some(end) => {
            let truncated = observed.truncate_after(end);
            if truncated.len() < 2 {
                return Err(AppError::new(
                    2,
                    format!("Fewer than 2 observed samples at or before t={end}."),
                ));
            }
            Ok(truncated)
        }
        None => Ok(observed),
    }
}

/// Fit `config.parameters`; the fit window always covers `observed`.
pub fn run_fit_command(
    definition: &ModelDefinition,
    observed: &Trajectory,
    config: &FitConfig,
) -> Result<FitReport, AppError> {
    let config = FitConfig {
        window: window_covering(observed)?,
        ..config.clone()
    };
    Ok(fit_parameters(&AnalyticBackend, definition, observed, &config)?)
}

/// Simulate and evaluate a suite (the built-in one for the model kind if none is given).
pub fn run_verification(
    definition: &ModelDefinition,
    suite_path: Option<&std::path::Path>,
    window: &TimeWindow,
) -> Result<VerificationReport, AppError> {
    let suite = match suite_path {
        Some(path) => read_suite(path)?,
        None => default_suite(definition.kind),
    };
    let trajectory = run_simulation(definition, window)?;
    Ok(suite.evaluate(&trajectory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitMethod, ParameterSpec};

    fn model_args(model: &str, overrides: Vec<(String, f64)>) -> ModelArgs {
        ModelArgs {
            model: model.to_string(),
            overrides,
        }
    }

    #[test]
    fn overrides_are_applied_and_validated() {
        let def = load_definition(&model_args("linear-pathway", vec![("k1".to_string(), 3.0)])).unwrap();
        assert_eq!(def.parameters.get("k1"), Some(&3.0));

        let err = load_definition(&model_args("linear-pathway", vec![("k9".to_string(), 3.0)])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn study_defaults_to_every_parameter() {
        let def = crate::models::catalog::oscillator();
        let config = StudyConfig {
            window: TimeWindow::new(0.0, 10.0, 1001).unwrap(),
            ..StudyConfig::default()
        };
        let outcome = run_study_command(&def, &[], &[0.0, 10.0], "X", None, &config, true).unwrap();
        assert_eq!(outcome.responses.factors().len(), 6);
        let influential = outcome.influential_factors(1e-9);
        assert!(influential.contains(&"frequency"));
    }

    #[test]
    fn synthetic_fit_with_truncation_recovers_truth() {
        let def = crate::models::catalog::linear_pathway();
        let truth = vec![("k1".to_string(), 0.7)];
        let source = ObservationSource::Synthetic {
            truth: &truth,
            window: TimeWindow::new(0.0, 10.0, 101).unwrap(),
            noise_std: 0.0,
            seed: 1,
        };
        let observed = load_observations(&def, &source, Some(6.0)).unwrap();
        assert_eq!(observed.len(), 61);

        let config = FitConfig {
            window: TimeWindow::new(0.0, 1.0, 2).unwrap(),
            parameters: vec![ParameterSpec::new("k1", 0.1, 1.0, 3.0).unwrap()],
            method: FitMethod::Local,
            grid_steps: 11,
            population: 10,
            generations: 10,
            max_evaluations: 2_000,
            seed: 1,
            columns: None,
        };
        let report = run_fit_command(&def, &observed, &config).unwrap();
        let k1 = report.value("k1").unwrap();
        assert!((k1 - 0.7).abs() < 1e-3, "k1={k1}");
    }

    #[test]
    fn verification_uses_default_suite() {
        let def = crate::models::catalog::linear_pathway();
        let report = run_verification(&def, None, &crate::domain::DEFAULT_WINDOW).unwrap();
        assert!(report.all_passed());
    }
}
