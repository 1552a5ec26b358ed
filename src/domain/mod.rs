//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - simulation data (`TimeWindow`, `Trajectory`)
//! - study outputs (`ResponseTable`)
//! - fitting inputs (`ParameterSpec`, `Bounds`)
//! - run configuration (`StudyConfig`, `FitConfig`, `FitMethod`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
