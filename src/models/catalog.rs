//! Built-in model definitions.
//!
//! Shared models are compiled in rather than fetched at run time. Additional
//! definitions can be loaded from JSON (`io::read_model_definition`).

use crate::error::AnalysisError;
use crate::models::{ModelDefinition, ModelKind};

pub const LINEAR_PATHWAY: &str = "linear-pathway";
pub const OSCILLATOR: &str = "oscillator";

/// `S1 -> S2 -> S3`, `S1(0) = 10`, `k1 = k2 = 1`.
pub fn linear_pathway() -> ModelDefinition {
    ModelDefinition::new(LINEAR_PATHWAY, ModelKind::LinearPathway)
}

/// Sustained 5 Hz oscillation around 2 with a 0.5 s start-up transient.
pub fn oscillator() -> ModelDefinition {
    ModelDefinition::new(OSCILLATOR, ModelKind::Oscillator)
}

pub fn names() -> &'static [&'static str] {
    &[LINEAR_PATHWAY, OSCILLATOR]
}

pub fn lookup(name: &str) -> Result<ModelDefinition, AnalysisError> {
    match name {
        LINEAR_PATHWAY => Ok(linear_pathway()),
        OSCILLATOR => Ok(oscillator()),
        other => Err(AnalysisError::UnknownModel(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalyticModel, Simulator};

    #[test]
    fn every_catalog_entry_loads() {
        for name in names() {
            let def = lookup(name).unwrap();
            assert_eq!(def.name, *name);
            let model = AnalyticModel::load(&def).unwrap();
            assert!(!model.parameter_names().is_empty());
        }
    }

    #[test]
    fn unknown_names_fail() {
        assert_eq!(
            lookup("wolf"),
            Err(AnalysisError::UnknownModel("wolf".to_string()))
        );
    }
}
