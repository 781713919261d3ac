//! Regular grids used for multi-start seeds and for sampling fitted curves.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::invalid_input(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::invalid_input("Log grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Generate `n` evenly spaced points between `min` and `max` (inclusive).
///
/// A degenerate range (`max <= min`) yields `n` copies of `min`.
pub fn lin_space(min: f64, max: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    let span = if max > min { max - min } else { 0.0 };
    (0..n)
        .map(|i| min + span * (i as f64 / (n as f64 - 1.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.001, 1.0, 4).unwrap();
        assert!((v[0] - 0.001).abs() < 1e-15);
        assert!((v[1] - 0.01).abs() < 1e-12);
        assert!((v[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert!(log_space(0.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 1.0, 5).is_err());
        assert!(log_space(0.1, 1.0, 1).is_err());
    }

    #[test]
    fn lin_space_is_inclusive() {
        let v = lin_space(0.0, 5.0, 6);
        assert_eq!(v.len(), 6);
        for (i, x) in v.iter().enumerate() {
            assert!((x - i as f64).abs() < 1e-12);
        }
    }
}
