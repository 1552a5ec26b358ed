//! Design of experiments.
//!
//! - `sweep`: simulate one factor at several levels
//! - `response`: reduce sweeps to a factor x level response table and split it
//!   into baseline (`mu`) and effects (`alpha`)

pub mod response;
pub mod sweep;

pub use response::*;
pub use sweep::*;
