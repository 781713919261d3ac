//! Sample data sources that do not come from files.

pub mod sample;

pub use sample::*;
