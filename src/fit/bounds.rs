//! Box constraints on the fitted parameters.
//!
//! Bounds are derived from the data the same way for every run, so they are
//! deterministic given the inputs. A bound interval must be non-empty with
//! `lower < upper` and the initial guess must lie inside it; anything else is
//! reported as a degenerate-bounds error instead of being clamped silently.

use nalgebra::DVector;

use crate::error::AppError;

/// Lower bound of the time-fit decay rate `B`.
pub const B_MIN: f64 = 0.001;
/// Upper bound of the time-fit decay rate `B`.
pub const B_MAX: f64 = 1.0;
/// Lower bound of `D` for the free space fit.
pub const D_MIN: f64 = 0.01;
/// Upper bound of `D` for the free space fit.
pub const D_MAX: f64 = 100.0;
/// Lower bound of `D` for the pinned space fit (`D` only has to stay positive).
pub const D_MIN_PINNED: f64 = 1e-12;

/// Per-parameter `[lower, upper]` box.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    /// Time-fit box: `B ∈ [0.001, 1]`, `Io ∈ [0, 2·max(It)]`, `Ib ∈ [0, 3·min(It)]`.
    ///
    /// The `Ib` box is empty when `min(It) < 0` and zero-width when
    /// `min(It) == 0`; [`Bounds::validate`] reports both.
    pub fn for_time(it: &[f64]) -> Self {
        let (min, max) = range_of(it);
        Self::new(vec![B_MIN, 0.0, 0.0], vec![B_MAX, 2.0 * max, 3.0 * min])
    }

    /// Free space-fit box: `D ∈ [0.01, 100]`, `Io ∈ [0, max(Ix)]`, `Ib ∈ [0, max(Ix)]`.
    pub fn for_space(ix: &[f64]) -> Self {
        let (_, max) = range_of(ix);
        Self::new(vec![D_MIN, 0.0, 0.0], vec![D_MAX, max, max])
    }

    /// Pinned space-fit box: `D ∈ [1e-12, ∞)`.
    pub fn for_space_pinned() -> Self {
        Self::new(vec![D_MIN_PINNED], vec![f64::INFINITY])
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Check the box is well formed and contains `guess`.
    pub fn validate(&self, names: &[&str], guess: &[f64]) -> Result<(), AppError> {
        if self.lower.len() != self.upper.len() || self.lower.len() != guess.len() {
            return Err(AppError::degenerate_bounds(format!(
                "Bounds/guess dimension mismatch: lower={}, upper={}, guess={}.",
                self.lower.len(),
                self.upper.len(),
                guess.len()
            )));
        }

        for (i, ((&lo, &hi), &g)) in self.lower.iter().zip(&self.upper).zip(guess).enumerate() {
            let name = names.get(i).copied().unwrap_or("?");
            if !lo.is_finite() || hi.is_nan() {
                return Err(AppError::degenerate_bounds(format!(
                    "Bound for {name} is not usable: [{lo}, {hi}]."
                )));
            }
            if lo >= hi {
                return Err(AppError::degenerate_bounds(format!(
                    "Bound for {name} is empty: [{lo}, {hi}] (lower must be < upper)."
                )));
            }
            if !(g.is_finite() && g >= lo && g <= hi) {
                return Err(AppError::degenerate_bounds(format!(
                    "Initial guess {name}={g} lies outside its bound [{lo}, {hi}]."
                )));
            }
        }
        Ok(())
    }

    /// Clamp `v` into the box.
    pub fn project(&self, v: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            v.len(),
            v.iter()
                .zip(self.lower.iter().zip(&self.upper))
                .map(|(&x, (&lo, &hi))| x.clamp(lo, hi)),
        )
    }

    pub fn contains(&self, v: &[f64]) -> bool {
        v.len() == self.len()
            && v
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&x, (&lo, &hi))| x >= lo && x <= hi)
    }
}

/// `(min, max)` of a slice; `(inf, -inf)` when empty.
pub fn range_of(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
