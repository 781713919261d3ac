//! Multi-start grid generation.
//!
//! A single Levenberg–Marquardt run can stall in a poor basin when the decay
//! rate guess is far off. We therefore also start from a deterministic,
//! log-spaced set of decay values spanning the bound box; the other
//! parameters keep their data-derived guesses.
//!
//! Start 0 is always the documented initial guess, so `starts = 1` reproduces
//! the single-start behaviour exactly.

use crate::error::AppError;
use crate::fit::Bounds;
use crate::math::log_space;

/// How far from the guess the seeds may reach when a bound is open.
const OPEN_SPAN: f64 = 100.0;

/// Build `starts` start vectors; only component 0 (the decay parameter) varies.
pub fn start_grid(guess: &[f64], bounds: &Bounds, starts: usize) -> Result<Vec<Vec<f64>>, AppError> {
    if guess.is_empty() {
        return Err(AppError::invalid_input("Cannot build starts for an empty parameter vector."));
    }

    let mut out = vec![guess.to_vec()];
    if starts <= 1 {
        return Ok(out);
    }

    let g = guess[0];
    let lo = bounds.lower[0].max(g / OPEN_SPAN);
    let hi = bounds.upper[0].min(g * OPEN_SPAN);
    if !(lo > 0.0 && hi.is_finite() && hi > lo) {
        return Ok(out);
    }

    // One extra start sits at the geometric midpoint; more span the range.
    let seeds = if starts == 2 { vec![(lo * hi).sqrt()] } else { log_space(lo, hi, starts - 1)? };

    for seed in seeds {
        let mut start = guess.to_vec();
        start[0] = seed;
        // `exp(ln(bound))` can land one ulp outside the box.
        let clamped = bounds.project(&nalgebra::DVector::from_vec(start));
        out.push(clamped.iter().copied().collect());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_start_is_the_guess() {
        let bounds = Bounds::new(vec![0.001, 0.0, 0.0], vec![1.0, 10.0, 10.0]);
        let grid = start_grid(&[0.05, 3.0, 1.0], &bounds, 8).unwrap();
        assert_eq!(grid.len(), 8);
        assert_eq!(grid[0], vec![0.05, 3.0, 1.0]);
        for s in &grid[1..] {
            assert!(bounds.contains(s));
            assert_eq!(&s[1..], &[3.0, 1.0]);
        }
    }

    #[test]
    fn open_upper_bound_is_capped_around_the_guess() {
        let bounds = Bounds::for_space_pinned();
        let grid = start_grid(&[1.0], &bounds, 3).unwrap();
        assert_eq!(grid.len(), 3);
        assert!((grid[1][0] - 0.01).abs() < 1e-12);
        assert!((grid[2][0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn two_starts_add_the_geometric_midpoint() {
        let bounds = Bounds::new(vec![0.001, 0.0, 0.0], vec![1.0, 200.0, 20.0]);
        let grid = start_grid(&[0.05, 90.0, 10.0], &bounds, 2).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec![0.05, 90.0, 10.0]);
        // lo = max(0.001, 0.05/100), hi = min(1, 0.05*100)
        assert!((grid[1][0] - (0.001_f64 * 1.0).sqrt()).abs() < 1e-12);
        assert!(bounds.contains(&grid[1]));
    }

    #[test]
    fn every_start_count_builds_that_many_starts() {
        let bounds = Bounds::new(vec![0.01, 0.0, 0.0], vec![100.0, 60.0, 60.0]);
        for starts in 1..=6 {
            let grid = start_grid(&[1.0, 30.0, 5.0], &bounds, starts).unwrap();
            assert_eq!(grid.len(), starts);
        }
    }

    #[test]
    fn single_start_is_guess_only() {
        let bounds = Bounds::new(vec![0.01], vec![100.0]);
        assert_eq!(start_grid(&[1.0], &bounds, 1).unwrap(), vec![vec![1.0]]);
    }
}
