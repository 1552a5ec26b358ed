//! Closed-form reference backend.
//!
//! Two small textbook models whose trajectories have analytic solutions, so
//! the crate can run studies and fits without an external engine:
//!
//! - `LinearPathway`: `S1 -> S2 -> S3` with mass-action rates `k1*S1`, `k2*S2`
//!   and `S1(0) = S1_0`
//! - `Oscillator`: `X`, `Y` = `offset + amplitude * env(t) * sin/cos(2π f t + phase)`
//!   with `env(t) = exp(-decay t) * (1 - exp(-t / rise_time))`
//!
//! Numerical notes:
//! - `exp(-k1 t) - exp(-k2 t)` is computed as `-exp(-k1 t) * expm1(-(k2 - k1) t)`
//!   so nearly equal rates do not cancel catastrophically
//! - for `k1 == k2` the analytic limit `S2 = S1_0 k1 t exp(-k1 t)` is used

use std::collections::BTreeMap;
use std::f64::consts::PI;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{TimeWindow, Trajectory};
use crate::error::AnalysisError;
use crate::models::{SimulationBackend, Simulator};

/// Which closed-form model a definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    LinearPathway,
    Oscillator,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::LinearPathway => "linear pathway (S1 -> S2 -> S3)",
            ModelKind::Oscillator => "damped oscillator",
        }
    }

    /// Parameters and their default values.
    pub fn default_parameters(self) -> &'static [(&'static str, f64)] {
        match self {
            ModelKind::LinearPathway => &[("k1", 1.0), ("k2", 1.0), ("S1_0", 10.0)],
            ModelKind::Oscillator => &[
                ("amplitude", 1.0),
                ("frequency", 5.0),
                ("phase", 0.0),
                ("offset", 2.0),
                ("decay", 0.0),
                ("rise_time", 0.5),
            ],
        }
    }

    pub fn variable_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::LinearPathway => &["S1", "S2", "S3"],
            ModelKind::Oscillator => &["X", "Y"],
        }
    }
}

/// A named model: its kind plus parameter overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub kind: ModelKind,
    /// Values that replace the kind's defaults.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }
}

/// Backend that evaluates `ModelKind`s in closed form.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticBackend;

impl SimulationBackend for AnalyticBackend {
    type Definition = ModelDefinition;
    type Model = AnalyticModel;

    fn load(&self, definition: &ModelDefinition) -> Result<AnalyticModel, AnalysisError> {
        AnalyticModel::load(definition)
    }
}

/// A loaded closed-form model.
#[derive(Debug, Clone)]
pub struct AnalyticModel {
    kind: ModelKind,
    initial: BTreeMap<String, f64>,
    current: BTreeMap<String, f64>,
}

impl AnalyticModel {
    pub fn load(definition: &ModelDefinition) -> Result<Self, AnalysisError> {
        let mut initial: BTreeMap<String, f64> = definition
            .kind
            .default_parameters()
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        for (name, value) in &definition.parameters {
            let Some(slot) = initial.get_mut(name) else {
                return Err(AnalysisError::UnknownParameter(name.clone()));
            };
            if !value.is_finite() {
                return Err(AnalysisError::InvalidConfig(format!(
                    "model '{}': parameter '{name}' must be finite",
                    definition.name
                )));
            }
            *slot = *value;
        }
        Ok(Self {
            kind: definition.kind,
            current: initial.clone(),
            initial,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    fn value(&self, name: &str) -> f64 {
        self.current.get(name).copied().unwrap_or(f64::NAN)
    }

    fn evaluate(&self, t: f64, out: &mut [f64]) {
        match self.kind {
            ModelKind::LinearPathway => {
                let k1 = self.value("k1");
                let k2 = self.value("k2");
                let total = self.value("S1_0");
                let e1 = (-k1 * t).exp();
                let s1 = total * e1;
                let dk = k2 - k1;
                let s2 = if dk == 0.0 {
                    total * k1 * t * e1
                } else {
                    total * k1 * e1 * (-(-dk * t).exp_m1()) / dk
                };
                out[0] = s1;
                out[1] = s2;
                out[2] = total - s1 - s2;
            }
            ModelKind::Oscillator => {
                let amplitude = self.value("amplitude");
                let frequency = self.value("frequency");
                let phase = self.value("phase");
                let offset = self.value("offset");
                let decay = self.value("decay");
                let rise_time = self.value("rise_time");

                let rise = if rise_time > 0.0 {
                    -(-t / rise_time).exp_m1()
                } else {
                    1.0
                };
                let envelope = amplitude * (-decay * t).exp() * rise;
                let angle = 2.0 * PI * frequency * t + phase;
                out[0] = offset + envelope * angle.sin();
                out[1] = offset + envelope * angle.cos();
            }
        }
    }
}

impl Simulator for AnalyticModel {
    fn parameter_names(&self) -> Vec<String> {
        self.current.keys().cloned().collect()
    }

    fn variable_names(&self) -> Vec<String> {
        self.kind.variable_names().iter().map(|s| s.to_string()).collect()
    }

    fn parameter(&self, name: &str) -> Result<f64, AnalysisError> {
        self.current
            .get(name)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownParameter(name.to_string()))
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), AnalysisError> {
        let Some(slot) = self.current.get_mut(name) else {
            return Err(AnalysisError::UnknownParameter(name.to_string()));
        };
        *slot = value;
        Ok(())
    }

    fn reset(&mut self) {
        self.current.clone_from(&self.initial);
    }

    fn simulate(&mut self, window: &TimeWindow) -> Result<Trajectory, AnalysisError> {
        window.validate()?;
        let times = window.times();
        let names = self.variable_names();
        let mut values = DMatrix::<f64>::zeros(times.len(), names.len());
        let mut row = vec![0.0; names.len()];

        for (i, &t) in times.iter().enumerate() {
            self.evaluate(t, &mut row);
            for (j, &v) in row.iter().enumerate() {
                if !v.is_finite() {
                    return Err(AnalysisError::Simulation(format!(
                        "non-finite {} at t={t}",
                        names[j]
                    )));
                }
                values[(i, j)] = v;
            }
        }

        Trajectory::new(times, names, values)
    }
}
