//! Numerical building blocks: histograms, the Glauber table, the NBD,
//! correction polynomials and a weighted least-squares solver.

pub mod histogram;
pub mod nbd;
pub mod ols;
pub mod poly;
pub mod table;

pub use histogram::*;
pub use nbd::*;
pub use ols::*;
pub use poly::*;
pub use table::*;
