//! Profile likelihood utilities.
//!
//! Asymmetric (Minos-style) errors: for a parameter `θ` with best fit `θ̂`,
//! the upper and lower errors are the distances to the points where the
//! profiled NLL rises by `0.5` above its minimum, every other floating
//! parameter re-minimized at each trial value.

use crate::MaximumLikelihoodEstimator;
use np_core::traits::LogDensityModel;
use np_core::{Error, FitResult, ParameterState, Result};

/// `ΔNLL` that defines a 1σ interval.
pub const DELTA_NLL_1SIGMA: f64 = 0.5;

const MAX_BRACKET_STEPS: usize = 12;
const MAX_BISECTIONS: usize = 40;
const CROSSING_TOL: f64 = 1e-3;

/// Asymmetric error of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinosError {
    /// Upper error (`>= 0`)
    pub hi: f64,
    /// Lower error, signed (`<= 0`)
    pub lo: f64,
    /// The upper crossing was not reached before the parameter bound.
    pub hi_at_bound: bool,
    /// The lower crossing was not reached before the parameter bound.
    pub lo_at_bound: bool,
}

/// Profiled `ΔNLL` at `value` for parameter `idx`, everything else floating.
fn profile_delta(
    mle: &MaximumLikelihoodEstimator,
    model: &impl LogDensityModel,
    fitted: &ParameterState,
    idx: usize,
    value: f64,
    nll_hat: f64,
) -> Result<f64> {
    let mut state = fitted.clone();
    let name = state.parameters()[idx].name.clone();
    state.set_value(&name, value)?;
    state.set_constant(&name, true)?;
    let res = mle.minimize_state(model, &state)?;
    if !res.converged {
        log::debug!("conditional fit of '{}' at {} did not converge: {}", name, value, res.message);
    }
    Ok(res.fval - nll_hat)
}

/// Find the `ΔNLL = 0.5` crossing on one side of the minimum.
///
/// Returns the (unsigned) distance from `θ̂` and whether the bound was hit first.
fn crossing(
    mle: &MaximumLikelihoodEstimator,
    model: &impl LogDensityModel,
    fitted: &ParameterState,
    nll_hat: f64,
    idx: usize,
    direction: f64,
    initial_step: f64,
) -> Result<(f64, bool)> {
    let p = &fitted.parameters()[idx];
    let (center, (lo, hi)) = (p.value, p.bounds);
    let limit = if direction > 0.0 { hi - center } else { center - lo };
    if limit <= 0.0 {
        return Ok((0.0, true));
    }

    // Bracket [inner, outer] with delta(inner) < 0.5 <= delta(outer).
    let mut inner = 0.0;
    let mut step = initial_step.min(limit);
    let mut outer = None;
    for _ in 0..MAX_BRACKET_STEPS {
        let delta = profile_delta(mle, model, fitted, idx, center + direction * step, nll_hat)?;
        if delta >= DELTA_NLL_1SIGMA {
            outer = Some(step);
            break;
        }
        inner = step;
        if step >= limit {
            return Ok((limit, true));
        }
        step = (step * 2.0).min(limit);
    }
    let Some(mut outer) = outer else {
        return Err(Error::Convergence(format!(
            "No ΔNLL = 0.5 crossing found for '{}' within {} steps",
            p.name, MAX_BRACKET_STEPS
        )));
    };

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (inner + outer);
        let delta = profile_delta(mle, model, fitted, idx, center + direction * mid, nll_hat)?;
        if (delta - DELTA_NLL_1SIGMA).abs() < CROSSING_TOL {
            return Ok((mid, false));
        }
        if delta < DELTA_NLL_1SIGMA {
            inner = mid;
        } else {
            outer = mid;
        }
    }
    Ok((0.5 * (inner + outer), false))
}

/// Minos-style asymmetric error for parameter `idx`.
///
/// `fitted` must hold the unconditional best fit (values and Hesse errors),
/// `nll_hat` its NLL. The Hesse error seeds the bracketing step.
pub fn minos_error(
    mle: &MaximumLikelihoodEstimator,
    model: &impl LogDensityModel,
    fitted: &ParameterState,
    nll_hat: f64,
    idx: usize,
) -> Result<MinosError> {
    let p = fitted.parameters().get(idx).ok_or_else(|| {
        Error::Validation(format!("Parameter index {} out of range ({})", idx, fitted.len()))
    })?;
    if p.constant {
        return Ok(MinosError { hi: 0.0, lo: 0.0, hi_at_bound: false, lo_at_bound: false });
    }
    let hesse = p.error_hi.filter(|e| e.is_finite() && *e > 0.0).unwrap_or(1.0);

    let (hi, hi_at_bound) = crossing(mle, model, fitted, nll_hat, idx, 1.0, hesse)?;
    let (lo, lo_at_bound) = crossing(mle, model, fitted, nll_hat, idx, -1.0, hesse)?;
    if hi_at_bound || lo_at_bound {
        log::warn!(
            "Minos error for '{}' truncated at parameter bound (hi: {}, lo: {})",
            p.name,
            hi_at_bound,
            lo_at_bound
        );
    }
    Ok(MinosError { hi, lo: -lo, hi_at_bound, lo_at_bound })
}

/// Replace the Hesse errors of `indices` in `fit` by Minos errors.
///
/// Parameters whose crossing search fails keep their Hesse errors.
pub fn apply_minos(
    mle: &MaximumLikelihoodEstimator,
    model: &impl LogDensityModel,
    start: &ParameterState,
    fit: &mut FitResult,
    indices: &[usize],
) -> Result<()> {
    let mut fitted = start.clone();
    fitted.apply_fit(fit)?;
    for &idx in indices {
        match minos_error(mle, model, &fitted, fit.nll, idx) {
            Ok(err) => fit.set_asymmetric_error(idx, err.hi, err.lo),
            Err(e) => log::warn!("Minos failed for parameter {}: {}; keeping Hesse error", idx, e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// NLL = 0.5 * ((x - 1) / s(x))^2 with s = 0.2 above 1 and 0.1 below.
    struct Asymmetric;

    impl LogDensityModel for Asymmetric {
        fn dim(&self) -> usize {
            2
        }
        fn parameter_names(&self) -> Vec<String> {
            vec!["mu".into(), "alpha_a".into()]
        }
        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(-5.0, 5.0), (-5.0, 5.0)]
        }
        fn parameter_init(&self) -> Vec<f64> {
            vec![0.0, 0.5]
        }
        fn nll(&self, p: &[f64]) -> Result<f64> {
            let s = if p[0] >= 1.0 { 0.2 } else { 0.1 };
            Ok(0.5 * ((p[0] - 1.0) / s).powi(2) + 0.5 * p[1].powi(2))
        }
        fn grad_nll(&self, p: &[f64]) -> Result<Vec<f64>> {
            let s = if p[0] >= 1.0 { 0.2 } else { 0.1 };
            Ok(vec![(p[0] - 1.0) / (s * s), p[1]])
        }
    }

    #[test]
    fn test_minos_asymmetric_errors() {
        let model = Asymmetric;
        let mle = MaximumLikelihoodEstimator::new();
        let state = ParameterState::from_model(&model);
        let mut fit = mle.fit_state(&model, &state).unwrap();
        assert_relative_eq!(fit.parameters[0], 1.0, epsilon = 1e-3);

        apply_minos(&mle, &model, &state, &mut fit, &[0]).unwrap();
        assert_relative_eq!(fit.errors_hi[0], 0.2, epsilon = 5e-3);
        assert_relative_eq!(fit.errors_lo[0], -0.1, epsilon = 5e-3);
        // Untouched parameter keeps the Hesse error.
        assert_eq!(fit.errors_hi[1], fit.uncertainties[1]);
    }

    #[test]
    fn test_minos_truncated_at_bound() {
        struct Flat;
        impl LogDensityModel for Flat {
            fn dim(&self) -> usize {
                1
            }
            fn parameter_names(&self) -> Vec<String> {
                vec!["mu".into()]
            }
            fn parameter_bounds(&self) -> Vec<(f64, f64)> {
                vec![(0.0, 10.0)]
            }
            fn parameter_init(&self) -> Vec<f64> {
                vec![0.5]
            }
            fn nll(&self, p: &[f64]) -> Result<f64> {
                // Minimum at 0.3 with width 1: lower crossing lies outside the bound.
                Ok(0.5 * (p[0] - 0.3).powi(2))
            }
            fn grad_nll(&self, p: &[f64]) -> Result<Vec<f64>> {
                Ok(vec![p[0] - 0.3])
            }
        }

        let mle = MaximumLikelihoodEstimator::new();
        let mut fitted = ParameterState::from_model(&Flat);
        let fit = mle.fit_state(&Flat, &fitted).unwrap();
        fitted.apply_fit(&fit).unwrap();

        let err = minos_error(&mle, &Flat, &fitted, fit.nll, 0).unwrap();
        assert!(err.lo_at_bound);
        assert!(!err.hi_at_bound);
        assert_relative_eq!(err.lo, -0.3, epsilon = 1e-3);
        assert_relative_eq!(err.hi, 1.0, epsilon = 5e-3);
    }

    #[test]
    fn test_profile_delta_is_zero_at_minimum() {
        let model = Asymmetric;
        let mle = MaximumLikelihoodEstimator::new();
        let mut fitted = ParameterState::from_model(&model);
        let fit = mle.fit_state(&model, &fitted).unwrap();
        fitted.apply_fit(&fit).unwrap();

        let delta = |v| profile_delta(&mle, &model, &fitted, 0, v, fit.nll).unwrap();
        assert_relative_eq!(delta(1.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(delta(1.2), 0.5, epsilon = 1e-3);
        assert_relative_eq!(delta(0.9), 0.5, epsilon = 1e-3);
        // The fitted state itself is left untouched.
        assert!(!fitted.get("mu").unwrap().constant);
    }
}
