//! Run configuration understood by the pipeline.
//!
//! These structs are derived from CLI flags (plus defaults) and passed through
//! the library unchanged.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{ParameterSpec, TimeWindow};
use crate::error::AnalysisError;

/// Smallest percent change a level may request.
///
/// `-100%` maps a parameter to zero; anything lower would flip its sign.
pub const DEFAULT_LEVEL_FLOOR_PCT: f64 = -100.0;

/// Leading samples skipped before spectral analysis (startup transient).
pub const DEFAULT_DISCARD_COUNT: usize = 100;

/// Default simulation grid for studies.
pub const DEFAULT_WINDOW: TimeWindow = TimeWindow {
    start: 0.0,
    end: 5.0,
    num_points: 300,
};

/// Settings for a one-factor-at-a-time study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub window: TimeWindow,
    /// Leading samples dropped before the FFT.
    pub discard_count: usize,
    /// Largest spectral components ignored before reporting the peak.
    pub suppress_count: usize,
    /// Levels below this percent change are clamped to it.
    pub level_floor_pct: f64,
    /// Level (percent) whose response defines `mu`.
    pub baseline_level: f64,
    /// Effects at or below this magnitude count as "no effect".
    pub effect_tolerance: f64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            discard_count: DEFAULT_DISCARD_COUNT,
            suppress_count: 0,
            level_floor_pct: DEFAULT_LEVEL_FLOOR_PCT,
            baseline_level: 0.0,
            effect_tolerance: 1e-9,
        }
    }
}

impl StudyConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.window.validate()?;
        if self.discard_count.saturating_add(2) > self.window.num_points {
            return Err(AnalysisError::InvalidConfig(format!(
                "discard count {} leaves fewer than 2 of {} samples",
                self.discard_count, self.window.num_points
            )));
        }
        if !self.level_floor_pct.is_finite() {
            return Err(AnalysisError::InvalidConfig(
                "level floor must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// How parameters are searched during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitMethod {
    /// Bounded compass (pattern) search from the initial values.
    Local,
    /// Exhaustive grid over the bounds, refined by a local search.
    Grid,
    /// Differential evolution over the bounds, refined by a local search.
    Evolution,
}

impl FitMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            FitMethod::Local => "compass search",
            FitMethod::Grid => "grid search + compass",
            FitMethod::Evolution => "differential evolution + compass",
        }
    }
}

/// Settings for a parameter fit.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub window: TimeWindow,
    pub parameters: Vec<ParameterSpec>,
    pub method: FitMethod,
    /// Grid points per parameter (`FitMethod::Grid`).
    pub grid_steps: usize,
    /// Population size (`FitMethod::Evolution`).
    pub population: usize,
    /// Generations (`FitMethod::Evolution`).
    pub generations: usize,
    /// Local search evaluation budget.
    pub max_evaluations: usize,
    pub seed: u64,
    /// Observed variables the residual is taken over; `None` means all of them.
    pub columns: Option<Vec<String>>,
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.window.validate()?;
        if self.parameters.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "at least one parameter to fit is required".to_string(),
            ));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|q| q.name() == p.name()) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "parameter '{}' listed twice",
                    p.name()
                )));
            }
        }
        if let Some(columns) = &self.columns {
            if columns.is_empty() {
                return Err(AnalysisError::InvalidConfig(
                    "column selection must name at least one variable".to_string(),
                ));
            }
            for (i, c) in columns.iter().enumerate() {
                if columns[..i].contains(c) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "column '{c}' selected twice"
                    )));
                }
            }
        }
        Ok(())
    }
}
