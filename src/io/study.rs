//! Study JSON files.
//!
//! A study file is the portable record of a completed one-factor-at-a-time
//! study: the response table, its baseline split and enough run metadata to
//! reproduce it.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::doe::StudyOutcome;
use crate::domain::{ResponseTable, StudyConfig};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyFile {
    pub tool: String,
    pub generated: DateTime<Local>,
    pub model: String,
    pub variable: String,
    pub config: StudyConfig,
    pub factors: Vec<String>,
    pub levels: Vec<f64>,
    /// Peak frequency per factor (rows) and level (columns).
    pub responses: Vec<Vec<f64>>,
    pub baseline_factor: String,
    pub baseline_level: f64,
    pub mu: f64,
    /// `responses - mu`.
    pub alpha: Vec<Vec<f64>>,
    pub influential_factors: Vec<String>,
}

fn rows(table: &ResponseTable) -> Vec<Vec<f64>> {
    table
        .values()
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

impl StudyFile {
    pub fn new(model: &str, outcome: &StudyOutcome, config: &StudyConfig) -> Self {
        Self {
            tool: "kstudy".to_string(),
            generated: Local::now(),
            model: model.to_string(),
            variable: outcome.variable.clone(),
            config: config.clone(),
            factors: outcome.responses.factors().to_vec(),
            levels: outcome.responses.levels().to_vec(),
            responses: rows(&outcome.responses),
            baseline_factor: outcome.baseline_factor.clone(),
            baseline_level: outcome.baseline_level,
            mu: outcome.mu,
            alpha: rows(&outcome.alpha),
            influential_factors: outcome
                .influential_factors(config.effect_tolerance)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Write a study JSON file.
pub fn write_study_json(path: &Path, study: &StudyFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create study JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, study)
        .map_err(|e| AppError::new(2, format!("Failed to write study JSON: {e}")))
}

/// Read a study JSON file.
pub fn read_study_json(path: &Path) -> Result<StudyFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open study JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid study JSON: {e}")))
}
