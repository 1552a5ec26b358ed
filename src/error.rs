//! Error types.
//!
//! - `AnalysisError`: the typed taxonomy returned by the library (sweeps,
//!   spectra, predicates, residuals). Every message names the offending
//!   identifier.
//! - `AppError`: what the binary reports; carries a process exit code.

use thiserror::Error;

/// Failures raised by the analysis library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Unknown variable '{variable}' (available: {available}).")]
    InvalidVariable { variable: String, available: String },

    #[error("Insufficient samples for '{variable}': {available} available, {required} required.")]
    InsufficientSamples {
        variable: String,
        available: usize,
        required: usize,
    },

    #[error("Series length mismatch: {left} vs {right}.")]
    LengthMismatch { left: usize, right: usize },

    #[error("Unknown parameter '{0}'.")]
    UnknownParameter(String),

    #[error("Missing baseline cell: factor '{factor}', level {level}%.")]
    MissingBaselineCell { factor: String, level: f64 },

    #[error("Time grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Unknown model '{0}'.")]
    UnknownModel(String),

    #[error("Invalid parameter spec '{name}': {reason}")]
    InvalidParameterSpec { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Simulation failed: {0}")]
    Simulation(String),
}

impl AnalysisError {
    pub(crate) fn invalid_variable(variable: &str, available: &[String]) -> Self {
        Self::InvalidVariable {
            variable: variable.to_string(),
            available: available.join(", "),
        }
    }

    /// Exit code used when this error terminates the binary.
    ///
    /// 2 = bad input/configuration, 4 = analysis could not be completed.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::InvalidVariable { .. }
            | AnalysisError::UnknownParameter(_)
            | AnalysisError::UnknownModel(_)
            | AnalysisError::InvalidParameterSpec { .. }
            | AnalysisError::InvalidConfig(_) => 2,
            AnalysisError::InsufficientSamples { .. }
            | AnalysisError::LengthMismatch { .. }
            | AnalysisError::MissingBaselineCell { .. }
            | AnalysisError::GridMismatch(_)
            | AnalysisError::Simulation(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_error_names_identifier_and_maps_exit_code() {
        let err = AnalysisError::UnknownParameter("J1_Ki".to_string());
        assert!(err.to_string().contains("J1_Ki"));

        let app: AppError = err.into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("J1_Ki"));

        let app: AppError = AnalysisError::GridMismatch("len 3 vs 4".into()).into();
        assert_eq!(app.exit_code(), 4);
    }
}
