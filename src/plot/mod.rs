//! Terminal plots of the fitted curves.

pub mod ascii;

pub use ascii::*;
