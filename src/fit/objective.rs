//! Residuals and fit objectives.
//!
//! Given a model, a parameter assignment and an observed trajectory, we:
//! - assign the parameters
//! - simulate on the requested window
//! - require the simulated grid to match the observed one
//! - difference every observed variable (`observed - simulated`), or only
//!   a selected subset of them
//!
//! The sum of squared residuals is the objective handed to optimizers:
//! `f(parameter_vector) -> non-negative f64`, deterministic for fixed inputs.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::DMatrix;
use tracing::debug;

use crate::domain::{TimeWindow, Trajectory};
use crate::error::AnalysisError;
use crate::models::{SimulationBackend, Simulator};

/// Relative tolerance when comparing observed and simulated sample times.
pub const GRID_REL_TOL: f64 = 1e-9;

/// Residual trajectory `observed - simulated` on the observed time axis.
///
/// With `columns`, only those observed variables are differenced; an unknown
/// name is an `InvalidVariable` error.
pub fn residuals<M: Simulator>(
    model: &mut M,
    observed: &Trajectory,
    columns: Option<&[String]>,
    assignment: &[(&str, f64)],
    window: &TimeWindow,
) -> Result<Trajectory, AnalysisError> {
    let selected = select_columns(observed, columns)?;
    let observed = &*selected;
    for &(name, value) in assignment {
        model.set_parameter(name, value)?;
    }
    let simulated = model.simulate(window)?;

    if !observed.same_grid(&simulated, GRID_REL_TOL) {
        return Err(AnalysisError::GridMismatch(format!(
            "observed has {} samples on [{}, {}], simulated has {} on [{}, {}]",
            observed.len(),
            observed.times().first().copied().unwrap_or(f64::NAN),
            observed.times().last().copied().unwrap_or(f64::NAN),
            simulated.len(),
            window.start,
            window.end,
        )));
    }

    let names = observed.variable_names();
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        columns.push(simulated.variable_index(name)?);
    }
    let obs = observed.values();
    let sim = simulated.values();
    let diff = DMatrix::from_fn(observed.len(), names.len(), |i, j| {
        obs[(i, j)] - sim[(i, columns[j])]
    });

    Trajectory::new(observed.times().to_vec(), names.to_vec(), diff)
}

/// Sum of squared residuals over the selected observed variables and every sample.
pub fn sum_squared_residual<M: Simulator>(
    model: &mut M,
    observed: &Trajectory,
    columns: Option<&[String]>,
    assignment: &[(&str, f64)],
    window: &TimeWindow,
) -> Result<f64, AnalysisError> {
    let residual = residuals(model, observed, columns, assignment, window)?;
    Ok(residual.values().norm_squared())
}

fn select_columns<'t>(
    observed: &'t Trajectory,
    columns: Option<&[String]>,
) -> Result<Cow<'t, Trajectory>, AnalysisError> {
    match columns {
        Some(names) => Ok(Cow::Owned(observed.select_variables(names)?)),
        None => Ok(Cow::Borrowed(observed)),
    }
}

/// A scalar function to minimize.
///
/// Implementations must be safe to evaluate from several threads at once.
pub trait Objective: Sync {
    fn dimension(&self) -> usize;

    fn evaluate(&self, x: &[f64]) -> Result<f64, AnalysisError>;
}

/// Sum-of-squared-residuals objective over a fixed list of parameter names.
///
/// Every evaluation loads a fresh model from the backend, so concurrent
/// evaluations never share simulator state. The observed column selection is
/// applied once at construction.
pub struct ResidualObjective<'a, B: SimulationBackend> {
    backend: &'a B,
    definition: &'a B::Definition,
    observed: Cow<'a, Trajectory>,
    window: TimeWindow,
    names: Vec<String>,
    evaluations: AtomicUsize,
}

impl<'a, B: SimulationBackend> ResidualObjective<'a, B> {
    pub fn new(
        backend: &'a B,
        definition: &'a B::Definition,
        observed: &'a Trajectory,
        columns: Option<&[String]>,
        window: TimeWindow,
        names: Vec<String>,
    ) -> Result<Self, AnalysisError> {
        window.validate()?;
        let observed = select_columns(observed, columns)?;
        let model = backend.load(definition)?;
        if let Some(unknown) = names.iter().find(|n| !model.has_parameter(n)) {
            return Err(AnalysisError::UnknownParameter(unknown.clone()));
        }
        Ok(Self {
            backend,
            definition,
            observed,
            window,
            names,
            evaluations: AtomicUsize::new(0),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Observed data the residuals are taken against.
    pub fn observed(&self) -> &Trajectory {
        &self.observed
    }

    /// Number of `evaluate` calls so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl<B: SimulationBackend> Objective for ResidualObjective<'_, B> {
    fn dimension(&self) -> usize {
        self.names.len()
    }

    fn evaluate(&self, x: &[f64]) -> Result<f64, AnalysisError> {
        if x.len() != self.names.len() {
            return Err(AnalysisError::LengthMismatch {
                left: self.names.len(),
                right: x.len(),
            });
        }
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let assignment: Vec<(&str, f64)> = self
            .names
            .iter()
            .map(String::as_str)
            .zip(x.iter().copied())
            .collect();
        let mut model = self.backend.load(self.definition)?;
        let ssr = sum_squared_residual(&mut model, &self.observed, None, &assignment, &self.window)?;
        debug!(?x, ssr, "objective evaluated");
        Ok(ssr)
    }
}

/// Objective backed by a plain function.
pub struct FnObjective<F> {
    dimension: usize,
    f: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    pub fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn evaluate(&self, x: &[f64]) -> Result<f64, AnalysisError> {
        Ok((self.f)(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalyticBackend, AnalyticModel, catalog};

    fn window() -> TimeWindow {
        TimeWindow::new(0.0, 10.0, 100).unwrap()
    }

    fn observed() -> Trajectory {
        let truth = catalog::linear_pathway()
            .with_parameter("k1", 0.8)
            .with_parameter("k2", 0.3);
        AnalyticModel::load(&truth).unwrap().simulate(&window()).unwrap()
    }

    fn ssr(k1: f64, k2: f64) -> f64 {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        sum_squared_residual(&mut model, &observed(), None, &[("k1", k1), ("k2", k2)], &window()).unwrap()
    }

    #[test]
    fn true_parameters_give_zero_residual() {
        assert!(ssr(0.8, 0.3) < 1e-20);
    }

    #[test]
    fn perturbing_any_parameter_increases_residual() {
        let best = ssr(0.8, 0.3);
        for (k1, k2) in [(0.9, 0.3), (0.7, 0.3), (0.8, 0.35), (0.8, 0.25)] {
            assert!(ssr(k1, k2) > best, "k1={k1} k2={k2}");
        }
        assert!(ssr(1.2, 0.3) > ssr(0.9, 0.3));
    }

    #[test]
    fn residual_matrix_keeps_observed_layout() {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        let obs = observed();
        let res = residuals(&mut model, &obs, None, &[], &window()).unwrap();
        assert_eq!(res.variable_names(), obs.variable_names());
        assert_eq!(res.times(), obs.times());
        // S1 decays faster in the default model (k1 = 1), so observed S1 is larger.
        let s1 = res.column("S1").unwrap();
        assert!(s1[10] > 0.0);
        assert_eq!(s1[0], 0.0);
    }

    #[test]
    fn grid_mismatch_is_detected() {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        let other = TimeWindow::new(0.0, 10.0, 101).unwrap();
        assert!(matches!(
            sum_squared_residual(&mut model, &observed(), None, &[], &other),
            Err(AnalysisError::GridMismatch(_))
        ));
    }

    #[test]
    fn unknown_assignment_fails() {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        assert_eq!(
            sum_squared_residual(&mut model, &observed(), None, &[("k7", 1.0)], &window()),
            Err(AnalysisError::UnknownParameter("k7".to_string()))
        );
    }

    #[test]
    fn residual_objective_is_deterministic_and_counts_calls() {
        let obs = observed();
        let def = catalog::linear_pathway();
        let objective = ResidualObjective::new(
            &AnalyticBackend,
            &def,
            &obs,
            None,
            window(),
            vec!["k1".to_string(), "k2".to_string()],
        )
        .unwrap();
        assert_eq!(objective.dimension(), 2);
        let a = objective.evaluate(&[1.0, 1.0]).unwrap();
        let b = objective.evaluate(&[1.0, 1.0]).unwrap();
        assert_eq!(a, b);
        assert!(a > 0.0);
        assert!(objective.evaluate(&[0.8, 0.3]).unwrap() < 1e-20);
        assert_eq!(objective.evaluations(), 3);
        assert!(objective.evaluate(&[1.0]).is_err());
    }

    #[test]
    fn residual_objective_rejects_unknown_names() {
        let obs = observed();
        let def = catalog::linear_pathway();
        let result = ResidualObjective::new(
            &AnalyticBackend,
            &def,
            &obs,
            None,
            window(),
            vec!["J1_k1".to_string()],
        );
        assert!(matches!(result, Err(AnalysisError::UnknownParameter(_))));
    }

    #[test]
    fn selected_columns_limit_the_residual() {
        let mut model = AnalyticModel::load(&catalog::linear_pathway()).unwrap();
        let obs = observed();
        let only_s3 = ["S3".to_string()];
        let res = residuals(&mut model, &obs, Some(only_s3.as_slice()), &[], &window()).unwrap();
        assert_eq!(res.variable_names(), only_s3.as_slice());

        let all = sum_squared_residual(&mut model, &obs, None, &[], &window()).unwrap();
        let s3 = sum_squared_residual(&mut model, &obs, Some(only_s3.as_slice()), &[], &window()).unwrap();
        assert!(s3 > 0.0 && s3 < all);

        let unknown = ["Glucose".to_string()];
        assert!(matches!(
            sum_squared_residual(&mut model, &obs, Some(unknown.as_slice()), &[], &window()),
            Err(AnalysisError::InvalidVariable { .. })
        ));
        assert!(matches!(
            ResidualObjective::new(
                &AnalyticBackend,
                &catalog::linear_pathway(),
                &obs,
                Some(unknown.as_slice()),
                window(),
                vec!["k1".to_string()],
            ),
            Err(AnalysisError::InvalidVariable { .. })
        ));
    }
}
