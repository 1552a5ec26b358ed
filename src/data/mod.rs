//! Observed data sources.
//!
//! - `synthetic`: seeded noisy observations of simulated trajectories

pub mod synthetic;

pub use synthetic::*;
