//! Multiplicity model implementations.
//!
//! Models are small and immutable once built, so scan workers can share them
//! freely and keep their own random streams.

pub mod multiplicity;

pub use multiplicity::*;
