//! Input/output helpers.
//!
//! - trajectory CSV ingest + validation (`ingest`)
//! - model definition / verification suite JSON (`definition`)
//! - study JSON read/write (`study`)
//! - result exports (CSV/JSON) (`export`)

pub mod definition;
pub mod export;
pub mod ingest;
pub mod study;

pub use definition::*;
pub use export::*;
pub use ingest::*;
pub use study::*;
