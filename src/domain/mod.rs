//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model and scan configuration (`ModelParameters`, `ScanConfig`, `ScanAxis`)
//! - the lattice key used to index results (`ParameterKey`)
//! - comparison modes (`NormMode`, `Chi2Mode`)
//! - per-event correction inputs and outputs (`CorrectionParameters`, `EventCorrectionResult`)

pub mod types;

pub use types::*;
