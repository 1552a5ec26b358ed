//! Parameter fitting.
//!
//! Responsibilities:
//!
//! - compute residuals between observed and simulated trajectories
//! - generate parameter grids
//! - minimize the sum of squared residuals (local / grid / evolution)
//! - report fitted values and fit quality

pub mod fitter;
pub mod grid;
pub mod objective;
pub mod optimizer;

pub use fitter::*;
pub use grid::*;
pub use objective::*;
pub use optimizer::*;
