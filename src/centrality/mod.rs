//! Centrality definitions.
//!
//! - `bounds`: class thresholds derived from a simulated multiplicity distribution
//! - `corrector`: per-event vz/luminosity correction and class assignment
//! - `weights`: reweight parameters fitted to the simulated/reference ratio

pub mod bounds;
pub mod corrector;
pub mod weights;

pub use bounds::*;
pub use corrector::*;
pub use weights::*;
