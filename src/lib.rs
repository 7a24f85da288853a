//! `centrality-calib` library crate.
//!
//! The binary (`centrality`) is a thin wrapper around this library so that:
//!
//! - the fit and correction engines are testable without spawning processes
//! - the event corrector can be embedded in other analysis code
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod centrality;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod random;
pub mod report;
