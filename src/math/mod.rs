//! Mathematical utilities: dense least squares and regular grids.

pub mod grid;
pub mod ols;

pub use grid::*;
pub use ols::*;
