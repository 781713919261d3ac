//! Model evaluation for the time and space intensity curves.
//!
//! The solver relies on two primitive operations:
//! - predict `I` at one abscissa given a parameter vector
//! - fill the Jacobian row (partial derivatives) at that abscissa
//!
//! These are implemented here for each model kind.

/// `I(t) = Io * exp(-B t) + Ib`.
pub fn intensity_time(t: f64, b: f64, io: f64, ib: f64) -> f64 {
    io * (-b * t).exp() + ib
}

/// The space model, parameterized by the decay rate of the time fit.
///
/// `B` is held by value so the space fit never reaches back into the time
/// fit's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceModel {
    pub b: f64,
}

impl SpaceModel {
    pub fn new(b: f64) -> Self {
        Self { b }
    }

    /// `sqrt(B/D)`.
    pub fn rate(&self, d: f64) -> f64 {
        (self.b / d).sqrt()
    }

    /// `I(x) = Io * exp(-x sqrt(B/D)) + Ib`.
    pub fn intensity(&self, x: f64, d: f64, io: f64, ib: f64) -> f64 {
        io * (-x * self.rate(d)).exp() + ib
    }
}

/// `I(x) = Io * exp(-x sqrt(B/D)) + Ib` with `B` passed explicitly.
pub fn intensity_space(x: f64, d: f64, io: f64, ib: f64, b: f64) -> f64 {
    SpaceModel::new(b).intensity(x, d, io, ib)
}

/// A concrete model the solver can fit.
///
/// Parameter order:
/// - `Time`: `[B, Io, Ib]`
/// - `Space`: `[D, Io, Ib]`
/// - `SpacePinned`: `[D]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayModel {
    Time,
    Space(SpaceModel),
    /// Space model with amplitude and baseline fixed to the given values.
    SpacePinned { model: SpaceModel, io: f64, ib: f64 },
}

impl DecayModel {
    pub fn param_count(self) -> usize {
        match self {
            DecayModel::Time | DecayModel::Space(_) => 3,
            DecayModel::SpacePinned { .. } => 1,
        }
    }

    /// Parameter names, for diagnostics.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            DecayModel::Time => &["B", "Io", "Ib"],
            DecayModel::Space(_) => &["D", "Io", "Ib"],
            DecayModel::SpacePinned { .. } => &["D"],
        }
    }

    /// Predict `I` at `x` for the given parameters.
    ///
    /// # Panics
    /// Panics if `params` is shorter than `self.param_count()`.
    pub fn predict(self, x: f64, params: &[f64]) -> f64 {
        match self {
            DecayModel::Time => intensity_time(x, params[0], params[1], params[2]),
            DecayModel::Space(model) => model.intensity(x, params[0], params[1], params[2]),
            DecayModel::SpacePinned { model, io, ib } => model.intensity(x, params[0], io, ib),
        }
    }

    /// Fill the partial derivatives of `I(x)` with respect to each parameter.
    ///
    /// # Panics
    /// Panics if `params` or `out` are shorter than `self.param_count()`.
    pub fn fill_gradient_row(self, x: f64, params: &[f64], out: &mut [f64]) {
        match self {
            DecayModel::Time => {
                let (b, io) = (params[0], params[1]);
                let e = (-b * x).exp();
                out[0] = -io * x * e;
                out[1] = e;
                out[2] = 1.0;
            }
            DecayModel::Space(model) => {
                let (d, io) = (params[0], params[1]);
                out[0] = space_d_partial(model, x, d, io);
                out[1] = (-x * model.rate(d)).exp();
                out[2] = 1.0;
            }
            DecayModel::SpacePinned { model, io, .. } => {
                out[0] = space_d_partial(model, x, params[0], io);
            }
        }
    }
}

// d/dD [Io e^{-x k}] with k = sqrt(B/D), dk/dD = -k / (2D).
fn space_d_partial(model: SpaceModel, x: f64, d: f64, io: f64) -> f64 {
    let k = model.rate(d);
    io * (-x * k).exp() * x * k / (2.0 * d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_partial(model: DecayModel, x: f64, params: &[f64], j: usize) -> f64 {
        let h = 1e-6 * params[j].abs().max(1.0);
        let mut hi = params.to_vec();
        let mut lo = params.to_vec();
        hi[j] += h;
        lo[j] -= h;
        (model.predict(x, &hi) - model.predict(x, &lo)) / (2.0 * h)
    }

    #[test]
    fn time_model_matches_closed_form() {
        let y = intensity_time(2.0, 0.2, 100.0, 10.0);
        assert!((y - (100.0 * (-0.4_f64).exp() + 10.0)).abs() < 1e-12);
        assert_eq!(intensity_time(0.0, 0.7, 5.0, 1.0), 6.0);
    }

    #[test]
    fn space_model_uses_sqrt_b_over_d() {
        let y = intensity_space(3.0, 3.0, 50.0, 5.0, 0.2);
        let k = (0.2_f64 / 3.0).sqrt();
        assert!((y - (50.0 * (-3.0 * k).exp() + 5.0)).abs() < 1e-12);
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        let space = SpaceModel::new(0.2);
        let cases: Vec<(DecayModel, Vec<f64>)> = vec![
            (DecayModel::Time, vec![0.2, 100.0, 10.0]),
            (DecayModel::Space(space), vec![3.0, 50.0, 5.0]),
            (
                DecayModel::SpacePinned { model: space, io: 50.0, ib: 5.0 },
                vec![3.0],
            ),
        ];

        for (model, params) in cases {
            let mut row = vec![0.0; model.param_count()];
            for &x in &[0.0, 0.5, 2.0, 7.5] {
                model.fill_gradient_row(x, &params, &mut row);
                for j in 0..model.param_count() {
                    let num = numeric_partial(model, x, &params, j);
                    assert!(
                        (row[j] - num).abs() < 1e-5 * num.abs().max(1.0),
                        "{model:?} x={x} j={j}: analytic {} vs numeric {num}",
                        row[j]
                    );
                }
            }
        }
    }
}
