//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the measured input series (`SampleSet`)
//! - fit outputs (`TimeFit`, `SpaceFit`, `FitReport`)
//! - run configuration (`FitConfig`, `SolverOptions`, `SpacePolicy`)
//! - the JSON results schema (`ResultsFile`)

pub mod types;

pub use types::*;
