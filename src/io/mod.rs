//! Input/output helpers.
//!
//! - histogram object files (JSON) (`histograms`)
//! - correction parameter files (JSON) (`params`)
//! - event CSV ingest + corrected-event export (`events`)
//! - run summaries (JSON) (`export`)

pub mod events;
pub mod export;
pub mod histograms;
pub mod params;

pub use events::*;
pub use export::*;
pub use histograms::*;
pub use params::*;
