//! `kinetic-studies` library crate.
//!
//! The binary (`kstudy`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the analysis patterns (sweeps, spectral responses, shape predicates,
//!   residual fits) can be driven from other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod doe;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod verify;
