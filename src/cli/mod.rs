//! Command-line parsing for `kstudy`.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the simulation/analysis code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_DISCARD_COUNT, DEFAULT_LEVEL_FLOOR_PCT, DEFAULT_WINDOW, FitMethod, ParameterSpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "kstudy",
    version,
    about = "Sensitivity studies, parameter fits and verification for kinetic models"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate a model once and print (or export) the trajectory.
    Simulate(SimulateArgs),
    /// Simulate one parameter at several percent-change levels.
    Sweep(SweepArgs),
    /// Build a factor x level table of peak frequencies and split it into baseline + effects.
    Study(StudyArgs),
    /// Fit model parameters to an observed (or synthetic) trajectory.
    Fit(FitArgs),
    /// Check a simulated trajectory against a verification suite.
    Verify(VerifyArgs),
    /// List the built-in models.
    Models,
}

/// Which model to run, plus parameter overrides.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Catalog model name (see `kstudy models`) or path to a model JSON file.
    #[arg(short = 'm', long, default_value = "oscillator")]
    pub model: String,

    /// Override a model parameter (`name=value`); repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub overrides: Vec<(String, f64)>,
}

/// Simulation time grid.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    /// Simulation start time.
    #[arg(long, default_value_t = DEFAULT_WINDOW.start, allow_negative_numbers = true)]
    pub start: f64,

    /// Simulation end time.
    #[arg(long, default_value_t = DEFAULT_WINDOW.end)]
    pub end: f64,

    /// Number of evenly spaced samples (both endpoints included).
    #[arg(long, default_value_t = DEFAULT_WINDOW.num_points)]
    pub points: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Export the trajectory to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Parameter to perturb.
    #[arg(short = 'p', long)]
    pub parameter: String,

    /// Percent changes from the baseline value (comma separated).
    #[arg(
        short = 'l',
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_values_t = [-20.0, 0.0, 20.0]
    )]
    pub levels: Vec<f64>,

    /// Levels below this percent change are clamped to it.
    #[arg(long, default_value_t = DEFAULT_LEVEL_FLOOR_PCT, allow_negative_numbers = true)]
    pub level_floor: f64,

    /// Also report the peak frequency of this variable at each level.
    #[arg(long)]
    pub variable: Option<String>,

    /// Leading samples ignored by the peak-frequency report.
    #[arg(long, default_value_t = DEFAULT_DISCARD_COUNT)]
    pub discard: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct StudyArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Variable whose peak frequency is the response.
    #[arg(short = 'v', long, default_value = "X")]
    pub variable: String,

    /// Parameters to study (comma separated). Defaults to every model parameter.
    #[arg(short = 'f', long, value_delimiter = ',')]
    pub factors: Vec<String>,

    /// Percent changes from the baseline value (comma separated).
    #[arg(
        short = 'l',
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_values_t = [-20.0, 0.0, 20.0]
    )]
    pub levels: Vec<f64>,

    /// Factor whose cell defines the baseline `mu` (defaults to the first factor).
    #[arg(long)]
    pub baseline_factor: Option<String>,

    /// Level (percent) whose cell defines the baseline `mu`.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub baseline_level: f64,

    /// Leading samples dropped before the FFT.
    #[arg(long, default_value_t = DEFAULT_DISCARD_COUNT)]
    pub discard: usize,

    /// Number of strongest spectral components to ignore.
    #[arg(long, default_value_t = 0)]
    pub suppress: usize,

    /// Levels below this percent change are clamped to it.
    #[arg(long, default_value_t = DEFAULT_LEVEL_FLOOR_PCT, allow_negative_numbers = true)]
    pub level_floor: f64,

    /// Effects at or below this magnitude count as "no effect".
    #[arg(long, default_value_t = 1e-9)]
    pub tolerance: f64,

    /// Evaluate factors in parallel (one model instance per factor).
    #[arg(long)]
    pub parallel: bool,

    /// Export the response table to CSV.
    #[arg(long = "export-table")]
    pub export_table: Option<PathBuf>,

    /// Export the full study (responses, baseline, effects) to JSON.
    #[arg(long = "export-study")]
    pub export_study: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Parameter to fit as `name=lower:initial:upper`; repeatable.
    #[arg(long = "param", value_name = "NAME=LO:INIT:HI", required = true)]
    pub params: Vec<ParameterSpec>,

    /// Observed trajectory CSV. Without it, observations are synthesized from
    /// the model with `--truth` overrides and `--noise`.
    #[arg(long)]
    pub observed: Option<PathBuf>,

    /// Parameter values used to synthesize observations (`name=value`); repeatable.
    #[arg(long, value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub truth: Vec<(String, f64)>,

    /// Standard deviation of Gaussian noise added to synthetic observations.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Only fit samples up to this time.
    #[arg(long)]
    pub fit_until: Option<f64>,

    /// Observed variables to fit on (comma separated or repeated). Defaults to all.
    #[arg(long = "column", value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Search method.
    #[arg(long, value_enum, default_value_t = FitMethod::Evolution)]
    pub method: FitMethod,

    /// Grid points per parameter (`--method grid`).
    #[arg(long, default_value_t = 11)]
    pub grid_steps: usize,

    /// Population size (`--method evolution`).
    #[arg(long, default_value_t = 20)]
    pub population: usize,

    /// Generations (`--method evolution`).
    #[arg(long, default_value_t = 40)]
    pub generations: usize,

    /// Evaluation budget of the local refinement.
    #[arg(long, default_value_t = 5_000)]
    pub max_evaluations: usize,

    /// Random seed for evolution and synthetic noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the fit report to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Suite JSON file. Defaults to the built-in suite for the model kind.
    #[arg(long)]
    pub suite: Option<PathBuf>,

    /// Export the verification report to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Parse `name=value`.
pub fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value in '{s}': {e}"))?;
    if !value.is_finite() {
        return Err(format!("value in '{s}' must be finite"));
    }
    Ok((name.to_string(), value))
}
