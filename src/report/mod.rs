//! Reporting utilities: rankings and terminal summaries.

pub mod format;

pub use format::*;
