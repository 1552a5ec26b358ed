//! The simulation collaborator seam.
//!
//! Studies and fits never integrate anything themselves; they drive a
//! `Simulator` (one stateful model instance) obtained from a
//! `SimulationBackend`.
//!
//! Ownership rules:
//! - every mutating call takes `&mut self`, so a model instance belongs to one
//!   sweep or one objective evaluation at a time
//! - work that runs in parallel loads a fresh instance per task through the
//!   backend (which is `Sync`)

use crate::domain::{TimeWindow, Trajectory};
use crate::error::AnalysisError;

/// One loaded, stateful model.
pub trait Simulator {
    /// Names accepted by `parameter` / `set_parameter`.
    fn parameter_names(&self) -> Vec<String>;

    /// Names of the variables present in simulated trajectories.
    fn variable_names(&self) -> Vec<String>;

    /// Current value of a parameter.
    fn parameter(&self, name: &str) -> Result<f64, AnalysisError>;

    /// Assign a parameter. Fails with `UnknownParameter` for unknown names.
    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), AnalysisError>;

    /// Restore every parameter to the value it had when the model was loaded.
    fn reset(&mut self);

    /// Simulate on the given time grid.
    fn simulate(&mut self, window: &TimeWindow) -> Result<Trajectory, AnalysisError>;

    fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_ok()
    }
}

/// Loads model definitions into independent `Simulator` instances.
pub trait SimulationBackend: Sync {
    type Definition: Sync;
    type Model: Simulator;

    fn load(&self, definition: &Self::Definition) -> Result<Self::Model, AnalysisError>;
}
