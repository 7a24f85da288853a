//! Grid-scan fitting of the multiplicity model.
//!
//! Responsibilities:
//!
//! - generate the `(npp, k, x)` lattice
//! - simulate and compare every lattice point (parallel)
//! - select the best point and refit it with high statistics

pub mod compare;
pub mod lattice;
pub mod scanner;
pub mod selection;

pub use compare::*;
pub use lattice::*;
pub use scanner::*;
pub use selection::*;
