//! Parameter fitting orchestration.
//!
//! Given:
//! - a model definition and a backend to load it
//! - an observed trajectory
//! - parameters to fit with `(lower, initial, upper)`
//! - optionally, the observed columns the residual is taken over
//!
//! we minimize the sum of squared residuals with the configured method and
//! report the fitted values plus fit quality.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Bounds, FitConfig, FitMethod, Trajectory};
use crate::error::AnalysisError;
use crate::fit::grid::Spacing;
use crate::fit::objective::{Objective, ResidualObjective};
use crate::fit::optimizer::{
    CompassSearch, DifferentialEvolution, GlobalOptimizer, GridSearch, LocalOptimizer,
};
use crate::models::SimulationBackend;

/// One fitted parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedParameter {
    pub name: String,
    pub value: f64,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
}

impl FittedParameter {
    /// True when the fitted value sits on one of its bounds.
    pub fn at_bound(&self) -> bool {
        self.value <= self.lower || self.value >= self.upper
    }
}

/// Outcome of `fit_parameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub method: FitMethod,
    pub parameters: Vec<FittedParameter>,
    /// Sum of squared residuals at the fitted values.
    pub ssr: f64,
    /// Root mean squared residual per observed value.
    pub rmse: f64,
    /// Observed variables the residual was taken over.
    pub columns: Vec<String>,
    /// Number of observed values (samples x variables).
    pub n_observations: usize,
    pub evaluations: usize,
}

impl FitReport {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.parameters.iter().find(|p| p.name == name).map(|p| p.value)
    }
}

/// Fit `config.parameters` of `definition` to `observed`.
pub fn fit_parameters<B: SimulationBackend>(
    backend: &B,
    definition: &B::Definition,
    observed: &Trajectory,
    config: &FitConfig,
) -> Result<FitReport, AnalysisError> {
    config.validate()?;
    let names: Vec<String> = config.parameters.iter().map(|p| p.name().to_string()).collect();
    let bounds: Vec<Bounds> = config.parameters.iter().map(|p| p.bounds()).collect();
    let initial: Vec<f64> = config.parameters.iter().map(|p| p.initial()).collect();

    let objective = ResidualObjective::new(
        backend,
        definition,
        observed,
        config.columns.as_deref(),
        config.window,
        names,
    )?;
    info!(
        method = config.method.display_name(),
        parameters = objective.dimension(),
        samples = observed.len(),
        columns = objective.observed().variable_names().len(),
        "fitting parameters"
    );

    let local = CompassSearch {
        max_evaluations: config.max_evaluations,
        ..CompassSearch::default()
    };
    let start = match config.method {
        FitMethod::Local => initial,
        FitMethod::Grid => {
            GridSearch {
                steps: config.grid_steps,
                spacing: Spacing::Linear,
            }
            .global_search(&objective, &bounds)?
            .x
        }
        FitMethod::Evolution => {
            DifferentialEvolution::new(config.population, config.generations, config.seed)
                .global_search(&objective, &bounds)?
                .x
        }
    };
    let optimum = local.minimize(&objective, &start, &bounds)?;

    let fitted_on = objective.observed();
    let n_observations = fitted_on.len() * fitted_on.variable_names().len();
    let rmse = if n_observations > 0 {
        (optimum.value / n_observations as f64).sqrt()
    } else {
        0.0
    };
    let parameters = config
        .parameters
        .iter()
        .zip(&optimum.x)
        .map(|(spec, &value)| FittedParameter {
            name: spec.name().to_string(),
            value,
            initial: spec.initial(),
            lower: spec.lower(),
            upper: spec.upper(),
        })
        .collect();

    info!(ssr = optimum.value, rmse, evaluations = objective.evaluations(), "fit complete");
    Ok(FitReport {
        method: config.method,
        parameters,
        ssr: optimum.value,
        rmse,
        columns: fitted_on.variable_names().to_vec(),
        n_observations,
        evaluations: objective.evaluations(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterSpec, TimeWindow};
    use crate::models::{AnalyticBackend, AnalyticModel, Simulator, catalog};

    fn window() -> TimeWindow {
        TimeWindow::new(0.0, 10.0, 60).unwrap()
    }

    fn observed() -> Trajectory {
        let truth = catalog::linear_pathway()
            .with_parameter("k1", 0.6)
            .with_parameter("k2", 0.25);
        AnalyticModel::load(&truth).unwrap().simulate(&window()).unwrap()
    }

    fn config(method: FitMethod) -> FitConfig {
        FitConfig {
            window: window(),
            parameters: vec![
                ParameterSpec::new("k1", 0.0, 1.0, 5.0).unwrap(),
                ParameterSpec::new("k2", 0.0, 1.0, 5.0).unwrap(),
            ],
            method,
            grid_steps: 11,
            population: 15,
            generations: 30,
            max_evaluations: 4_000,
            seed: 42,
            columns: None,
        }
    }

    #[test]
    fn every_method_recovers_generating_parameters() {
        let obs = observed();
        let def = catalog::linear_pathway();
        for method in [FitMethod::Local, FitMethod::Grid, FitMethod::Evolution] {
            let report = fit_parameters(&AnalyticBackend, &def, &obs, &config(method)).unwrap();
            let k1 = report.value("k1").unwrap();
            let k2 = report.value("k2").unwrap();
            assert!((k1 - 0.6).abs() < 1e-2, "{method:?}: k1={k1}");
            assert!((k2 - 0.25).abs() < 1e-2, "{method:?}: k2={k2}");
            assert!(report.ssr < 1e-3, "{method:?}: ssr={}", report.ssr);
            assert_eq!(report.n_observations, 60 * 3);
            assert!(report.evaluations > 0);
        }
    }

    #[test]
    fn unknown_fit_parameter_is_rejected() {
        let obs = observed();
        let def = catalog::linear_pathway();
        let mut cfg = config(FitMethod::Local);
        cfg.parameters.push(ParameterSpec::new("J1_k1", 0.0, 1.0, 2.0).unwrap());
        assert!(matches!(
            fit_parameters(&AnalyticBackend, &def, &obs, &cfg),
            Err(AnalysisError::UnknownParameter(_))
        ));
    }

    #[test]
    fn fitting_on_the_intermediate_alone_recovers_both_rates() {
        let obs = observed();
        let def = catalog::linear_pathway();
        let cfg = FitConfig {
            parameters: vec![
                ParameterSpec::new("k1", 0.4, 1.0, 2.0).unwrap(),
                ParameterSpec::new("k2", 0.05, 0.2, 0.4).unwrap(),
            ],
            population: 20,
            generations: 40,
            columns: Some(vec!["S2".to_string()]),
            ..config(FitMethod::Evolution)
        };
        let report = fit_parameters(&AnalyticBackend, &def, &obs, &cfg).unwrap();
        let k1 = report.value("k1").unwrap();
        let k2 = report.value("k2").unwrap();
        assert!((k1 - 0.6).abs() < 1e-2, "k1={k1}");
        assert!((k2 - 0.25).abs() < 1e-2, "k2={k2}");
        assert_eq!(report.columns, vec!["S2".to_string()]);
        assert_eq!(report.n_observations, 60);
    }

    #[test]
    fn unknown_fit_column_is_rejected() {
        let obs = observed();
        let def = catalog::linear_pathway();
        let cfg = FitConfig {
            columns: Some(vec!["S5".to_string()]),
            ..config(FitMethod::Local)
        };
        assert!(matches!(
            fit_parameters(&AnalyticBackend, &def, &obs, &cfg),
            Err(AnalysisError::InvalidVariable { .. })
        ));
    }
}
