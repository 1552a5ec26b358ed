//! One-factor-at-a-time response tables.
//!
//! For every factor, a sweep over the shared levels is run and each trajectory
//! is reduced to its peak frequency. The result is a factor x level table
//! `y[i][k]`, from which we derive:
//!
//! - `mu`: the response at the baseline cell
//! - `alpha[i][k] = y[i][k] - mu`: the effect of each factor/level change
//!
//! Building is all-or-nothing: the first failing run aborts the study and no
//! partially filled table is returned.

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::info;

use crate::doe::sweep::{SweepSettings, run_sweep};
use crate::domain::{ResponseTable, StudyConfig};
use crate::error::AnalysisError;
use crate::math::peak_frequency;
use crate::models::{SimulationBackend, Simulator};

/// Baseline and effects of a completed study.
#[derive(Debug, Clone)]
pub struct StudyOutcome {
    pub variable: String,
    pub responses: ResponseTable,
    pub baseline_factor: String,
    pub baseline_level: f64,
    pub mu: f64,
    pub alpha: ResponseTable,
}

impl StudyOutcome {
    /// Factors whose effect exceeds `tolerance` at some level.
    pub fn influential_factors(&self, tolerance: f64) -> Vec<&str> {
        self.alpha.influential_factors(tolerance)
    }
}

fn sweep_settings(config: &StudyConfig) -> SweepSettings {
    SweepSettings {
        window: config.window,
        level_floor_pct: config.level_floor_pct,
    }
}

/// Peak-frequency responses of one factor, one per level.
fn factor_responses<M: Simulator>(
    model: &mut M,
    factor: &str,
    levels: &[f64],
    variable: &str,
    config: &StudyConfig,
) -> Result<Vec<f64>, AnalysisError> {
    let sweep = run_sweep(model, factor, levels, &sweep_settings(config))?;
    sweep
        .runs
        .iter()
        .map(|run| {
            peak_frequency(
                &run.trajectory,
                variable,
                config.discard_count,
                config.suppress_count,
            )
        })
        .collect()
}

fn assemble(
    factors: &[String],
    levels: &[f64],
    rows: Vec<Vec<f64>>,
) -> Result<ResponseTable, AnalysisError> {
    let values = DMatrix::from_fn(factors.len(), levels.len(), |i, j| rows[i][j]);
    ResponseTable::new(factors.to_vec(), levels.to_vec(), values)
}

/// Build the factor x level table of peak frequencies of `variable`.
pub fn build_response_table<M: Simulator>(
    model: &mut M,
    factors: &[String],
    levels: &[f64],
    variable: &str,
    config: &StudyConfig,
) -> Result<ResponseTable, AnalysisError> {
    config.validate()?;
    ResponseTable::check_axes(factors, levels)?;
    info!(
        factors = factors.len(),
        levels = levels.len(),
        variable,
        "building response table"
    );

    let mut rows = Vec::with_capacity(factors.len());
    for factor in factors {
        rows.push(factor_responses(model, factor, levels, variable, config)?);
    }
    assemble(factors, levels, rows)
}

/// Same table as `build_response_table`, with factors evaluated in parallel.
///
/// Each factor gets its own freshly loaded model, so no instance is shared
/// between threads. Row order follows `factors`.
pub fn build_response_table_parallel<B: SimulationBackend>(
    backend: &B,
    definition: &B::Definition,
    factors: &[String],
    levels: &[f64],
    variable: &str,
    config: &StudyConfig,
) -> Result<ResponseTable, AnalysisError> {
    config.validate()?;
    ResponseTable::check_axes(factors, levels)?;
    info!(
        factors = factors.len(),
        levels = levels.len(),
        variable,
        "building response table (parallel)"
    );

    let rows: Vec<Vec<f64>> = factors
        .par_iter()
        .map(|factor| {
            let mut model = backend.load(definition)?;
            factor_responses(&mut model, factor, levels, variable, config)
        })
        .collect::<Result<_, _>>()?;
    assemble(factors, levels, rows)
}

/// Split a response table into `mu` and the effect table `alpha = table - mu`.
pub fn split_baseline(
    table: &ResponseTable,
    baseline_factor: &str,
    baseline_level: f64,
) -> Result<(f64, ResponseTable), AnalysisError> {
    let mu = table.get(baseline_factor, baseline_level).ok_or_else(|| {
        AnalysisError::MissingBaselineCell {
            factor: baseline_factor.to_string(),
            level: baseline_level,
        }
    })?;
    Ok((mu, table.shifted(mu)))
}

/// Build the table and split it at `(baseline_factor, config.baseline_level)`.
///
/// `baseline_factor` defaults to the first factor.
pub fn run_study<M: Simulator>(
    model: &mut M,
    factors: &[String],
    levels: &[f64],
    variable: &str,
    baseline_factor: Option<&str>,
    config: &StudyConfig,
) -> Result<StudyOutcome, AnalysisError> {
    let responses = build_response_table(model, factors, levels, variable, config)?;
    finish_study(responses, variable, baseline_factor, config)
}

/// `run_study` on top of `build_response_table_parallel`.
pub fn run_study_parallel<B: SimulationBackend>(
    backend: &B,
    definition: &B::Definition,
    factors: &[String],
    levels: &[f64],
    variable: &str,
    baseline_factor: Option<&str>,
    config: &StudyConfig,
) -> Result<StudyOutcome, AnalysisError> {
    let responses =
        build_response_table_parallel(backend, definition, factors, levels, variable, config)?;
    finish_study(responses, variable, baseline_factor, config)
}

fn finish_study(
    responses: ResponseTable,
    variable: &str,
    baseline_factor: Option<&str>,
    config: &StudyConfig,
) -> Result<StudyOutcome, AnalysisError> {
    let baseline_factor = match baseline_factor {
        Some(f) => f.to_string(),
        None => responses.factors().first().cloned().ok_or_else(|| {
            AnalysisError::InvalidConfig("a study needs at least one factor".to_string())
        })?,
    };
    let (mu, alpha) = split_baseline(&responses, &baseline_factor, config.baseline_level)?;
    info!(mu, baseline_factor = %baseline_factor, "study complete");

    Ok(StudyOutcome {
        variable: variable.to_string(),
        responses,
        baseline_factor,
        baseline_level: config.baseline_level,
        mu,
        alpha,
    })
}
