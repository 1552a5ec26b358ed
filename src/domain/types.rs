//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - produced by a simulation backend or read from CSV
//! - consumed read-only by the analysis code
//! - exported to JSON/CSV

use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Simulation time grid: `num_points` evenly spaced samples on `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
    pub num_points: usize,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64, num_points: usize) -> Result<Self, AnalysisError> {
        let window = Self {
            start,
            end,
            num_points,
        };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.start.is_finite() && self.end.is_finite() && self.end > self.start) {
            return Err(AnalysisError::InvalidConfig(format!(
                "time window [{}, {}] must be finite with end > start",
                self.start, self.end
            )));
        }
        if self.num_points < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "time window needs at least 2 points, got {}",
                self.num_points
            )));
        }
        Ok(())
    }

    /// Sample times, both endpoints included.
    pub fn times(&self) -> Vec<f64> {
        let step = (self.end - self.start) / (self.num_points as f64 - 1.0);
        (0..self.num_points)
            .map(|i| {
                if i + 1 == self.num_points {
                    self.end
                } else {
                    self.start + step * i as f64
                }
            })
            .collect()
    }
}

/// Time-indexed, multi-variable simulation output.
///
/// Invariants (checked at construction):
/// - times are finite and strictly increasing
/// - one matrix row per time, one matrix column per variable
/// - variable names are unique
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    names: Vec<String>,
    values: DMatrix<f64>,
}

impl Trajectory {
    pub fn new(
        times: Vec<f64>,
        names: Vec<String>,
        values: DMatrix<f64>,
    ) -> Result<Self, AnalysisError> {
        if values.nrows() != times.len() {
            return Err(AnalysisError::LengthMismatch {
                left: times.len(),
                right: values.nrows(),
            });
        }
        if values.ncols() != names.len() {
            return Err(AnalysisError::LengthMismatch {
                left: names.len(),
                right: values.ncols(),
            });
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(AnalysisError::InvalidConfig(
                "trajectory times must be finite".to_string(),
            ));
        }
        if let Some(w) = times.windows(2).find(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidConfig(format!(
                "trajectory times must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        for (i, name) in names.iter().enumerate() {
            if name.eq_ignore_ascii_case("time") || names[..i].contains(name) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "duplicate or reserved variable name '{name}'"
                )));
            }
        }
        Ok(Self {
            times,
            names,
            values,
        })
    }

    /// Build from `(name, values)` columns sharing `times`.
    pub fn from_columns(
        times: Vec<f64>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, AnalysisError> {
        let nrows = times.len();
        for (_, col) in &columns {
            if col.len() != nrows {
                return Err(AnalysisError::LengthMismatch {
                    left: nrows,
                    right: col.len(),
                });
            }
        }
        let values = DMatrix::from_fn(nrows, columns.len(), |i, j| columns[j].1[i]);
        let names = columns.into_iter().map(|(name, _)| name).collect();
        Self::new(times, names, values)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn variable_names(&self) -> &[String] {
        &self.names
    }

    /// Value matrix (rows = samples, columns = variables).
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn variable_index(&self, name: &str) -> Result<usize, AnalysisError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| AnalysisError::invalid_variable(name, &self.names))
    }

    /// Values of one variable, in time order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, AnalysisError> {
        let j = self.variable_index(name)?;
        Ok(self.values.column(j).iter().copied().collect())
    }

    /// Elapsed time between the first and the last sample.
    pub fn duration(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// True when both trajectories sample the same times (within `rel_tol`).
    pub fn same_grid(&self, other: &Trajectory, rel_tol: f64) -> bool {
        self.times.len() == other.times.len()
            && self.times.iter().zip(&other.times).all(|(a, b)| {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= rel_tol * scale
            })
    }

    /// Trajectory restricted to `names`, in the order given.
    pub fn select_variables(&self, names: &[String]) -> Result<Trajectory, AnalysisError> {
        let indices = names
            .iter()
            .map(|name| self.variable_index(name))
            .collect::<Result<Vec<usize>, _>>()?;
        let values = self.values.select_columns(indices.iter());
        Trajectory::new(self.times.clone(), names.to_vec(), values)
    }

    /// Keep only samples with `time <= end_time`.
    pub fn truncate_after(&self, end_time: f64) -> Trajectory {
        let keep = self.times.iter().take_while(|&&t| t <= end_time).count();
        Trajectory {
            times: self.times[..keep].to_vec(),
            names: self.names.clone(),
            values: self.values.rows(0, keep).into_owned(),
        }
    }
}

/// Expected direction of change for monotonicity checks.
///
/// Matches the `+1` / `-1` convention of the dynamic-testing predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Increasing => 1.0,
            Direction::Decreasing => -1.0,
        }
    }
}

impl TryFrom<i32> for Direction {
    type Error = AnalysisError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Increasing),
            -1 => Ok(Direction::Decreasing),
            other => Err(AnalysisError::InvalidConfig(format!(
                "direction must be +1 or -1, got {other}"
            ))),
        }
    }
}

/// Factor x level response table.
///
/// Rows are factors and columns are levels, both in the order they were
/// requested. There are no mutators: a table is built once and then only read
/// or shifted into a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTable {
    factors: Vec<String>,
    levels: Vec<f64>,
    values: DMatrix<f64>,
}

impl ResponseTable {
    pub fn new(
        factors: Vec<String>,
        levels: Vec<f64>,
        values: DMatrix<f64>,
    ) -> Result<Self, AnalysisError> {
        if values.nrows() != factors.len() {
            return Err(AnalysisError::LengthMismatch {
                left: factors.len(),
                right: values.nrows(),
            });
        }
        if values.ncols() != levels.len() {
            return Err(AnalysisError::LengthMismatch {
                left: levels.len(),
                right: values.ncols(),
            });
        }
        Self::check_axes(&factors, &levels)?;
        Ok(Self {
            factors,
            levels,
            values,
        })
    }

    /// Every factor and every level must be addressable by name or value.
    pub fn check_axes(factors: &[String], levels: &[f64]) -> Result<(), AnalysisError> {
        for (i, factor) in factors.iter().enumerate() {
            if factors[..i].contains(factor) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "factor '{factor}' appears more than once"
                )));
            }
        }
        for (i, level) in levels.iter().enumerate() {
            if levels[..i].contains(level) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "level {level}% appears more than once"
                )));
            }
        }
        Ok(())
    }

    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn factor_index(&self, factor: &str) -> Option<usize> {
        self.factors.iter().position(|f| f == factor)
    }

    /// Column of the level equal to `level`.
    pub fn level_index(&self, level: f64) -> Option<usize> {
        self.levels.iter().position(|&l| l == level)
    }

    pub fn get(&self, factor: &str, level: f64) -> Option<f64> {
        let i = self.factor_index(factor)?;
        let j = self.level_index(level)?;
        Some(self.values[(i, j)])
    }

    pub fn row(&self, factor: &str) -> Option<Vec<f64>> {
        let i = self.factor_index(factor)?;
        Some(self.values.row(i).iter().copied().collect())
    }

    /// New table with `offset` subtracted from every cell.
    pub fn shifted(&self, offset: f64) -> ResponseTable {
        ResponseTable {
            factors: self.factors.clone(),
            levels: self.levels.clone(),
            values: self.values.map(|v| v - offset),
        }
    }

    /// Factors with at least one cell whose magnitude exceeds `tolerance`.
    ///
    /// Meaningful on an effect (alpha) table.
    pub fn influential_factors(&self, tolerance: f64) -> Vec<&str> {
        self.factors
            .iter()
            .enumerate()
            .filter(|(i, _)| self.values.row(*i).iter().any(|v| v.abs() > tolerance))
            .map(|(_, f)| f.as_str())
            .collect()
    }
}

/// Bounds and starting value of a parameter to fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSpec")]
pub struct ParameterSpec {
    name: String,
    lower: f64,
    initial: f64,
    upper: f64,
}

#[derive(Deserialize)]
struct RawParameterSpec {
    name: String,
    lower: f64,
    initial: f64,
    upper: f64,
}

impl TryFrom<RawParameterSpec> for ParameterSpec {
    type Error = AnalysisError;

    fn try_from(raw: RawParameterSpec) -> Result<Self, Self::Error> {
        ParameterSpec::new(raw.name, raw.lower, raw.initial, raw.upper)
    }
}

impl ParameterSpec {
    pub fn new(
        name: impl Into<String>,
        lower: f64,
        initial: f64,
        upper: f64,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        if !(lower.is_finite() && initial.is_finite() && upper.is_finite()) {
            return Err(AnalysisError::InvalidParameterSpec {
                name,
                reason: "bounds and initial value must be finite".to_string(),
            });
        }
        if !(lower <= initial && initial <= upper) {
            return Err(AnalysisError::InvalidParameterSpec {
                name,
                reason: format!("expected lower <= initial <= upper, got {lower} / {initial} / {upper}"),
            });
        }
        Ok(Self {
            name,
            lower,
            initial,
            upper,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            lower: self.lower,
            upper: self.upper,
        }
    }
}

/// Parses `name=lower:initial:upper` (as used on the command line).
impl FromStr for ParameterSpec {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| AnalysisError::InvalidParameterSpec {
            name: s.to_string(),
            reason: reason.to_string(),
        };
        let (name, rest) = s
            .split_once('=')
            .ok_or_else(|| invalid("expected name=lower:initial:upper"))?;
        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid("expected name=lower:initial:upper"));
        }
        let mut nums = [0.0; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("bounds must be numbers"))?;
        }
        ParameterSpec::new(name.trim(), nums[0], nums[1], nums[2])
    }
}

/// Closed search interval for one optimization coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.lower).min(self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}
