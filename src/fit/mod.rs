//! Curve fitting.
//!
//! Responsibilities:
//!
//! - derive bound boxes and initial guesses from the data
//! - run the bounded Levenberg–Marquardt solver from several starts (parallel)
//! - chain the time fit into the space fit

pub mod bounds;
pub mod engine;
pub mod fitter;
pub mod lm;
pub mod starts;

pub use bounds::*;
pub use engine::*;
pub use fitter::*;
pub use lm::*;
pub use starts::*;
