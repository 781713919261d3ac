//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - results JSON read/write (`results`)

pub mod ingest;
pub mod results;

pub use ingest::*;
pub use results::*;
