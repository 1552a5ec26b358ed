//! Simulation models.
//!
//! - `simulator`: the `Simulator` / `SimulationBackend` seam every study and fit
//!   is written against
//! - `analytic`: a closed-form backend for two reference models
//! - `catalog`: named built-in definitions

pub mod analytic;
pub mod catalog;
pub mod simulator;

pub use analytic::*;
pub use simulator::*;
