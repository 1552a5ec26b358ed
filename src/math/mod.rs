//! Numerical utilities: spectral responses and series shape predicates.

pub mod sequence;
pub mod spectrum;

pub use sequence::*;
pub use spectrum::*;
