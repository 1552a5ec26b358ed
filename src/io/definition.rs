//! Model definition and verification suite JSON.
//!
//! A model definition names a closed-form kind plus parameter overrides:
//!
//! ```json
//! { "name": "fast-pathway", "kind": "linear-pathway", "parameters": { "k1": 2.5 } }
//! ```
//!
//! Commands accept either a catalog name or a path to such a file.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::models::{ModelDefinition, catalog};
use crate::verify::VerificationSuite;

/// Read a model definition JSON file.
pub fn read_model_definition(path: &Path) -> Result<ModelDefinition, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid model JSON '{}': {e}", path.display())))
}

/// Write a model definition JSON file.
pub fn write_model_definition(path: &Path, definition: &ModelDefinition) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, definition)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))
}

/// Resolve `model` as a catalog name, or else as a definition file path.
pub fn resolve_model(model: &str) -> Result<ModelDefinition, AppError> {
    if catalog::names().contains(&model) {
        return Ok(catalog::lookup(model)?);
    }
    let path = Path::new(model);
    if path.exists() {
        return read_model_definition(path);
    }
    Err(AppError::new(
        2,
        format!(
            "Unknown model '{model}': not a catalog model ({}) or an existing file.",
            catalog::names().join(", ")
        ),
    ))
}

/// Read a verification suite JSON file.
pub fn read_suite(path: &Path) -> Result<VerificationSuite, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open suite JSON '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid suite JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;

    #[test]
    fn definition_file_round_trip_and_resolution() {
        let path = std::env::temp_dir().join(format!("kstudy-def-{}.json", std::process::id()));
        let def = ModelDefinition::new("fast", ModelKind::LinearPathway).with_parameter("k1", 2.5);
        write_model_definition(&path, &def).unwrap();

        let resolved = resolve_model(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved, def);
        std::fs::remove_file(&path).ok();

        assert_eq!(resolve_model("oscillator").unwrap().kind, ModelKind::Oscillator);
        let err = resolve_model("no-such-model").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("no-such-model"));
    }

    #[test]
    fn suite_file_is_read() {
        let path = std::env::temp_dir().join(format!("kstudy-suite-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"name":"s","expectations":[{"check":"concave","variable":"S2"}]}"#,
        )
        .unwrap();
        let suite = read_suite(&path).unwrap();
        assert_eq!(suite.name, "s");
        assert_eq!(suite.expectations.len(), 1);
        std::fs::remove_file(&path).ok();

        assert!(read_suite(&path).is_err());
    }
}
