//! Maximum Likelihood Estimation

use crate::optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
use nalgebra::DMatrix;
use np_core::traits::LogDensityModel;
use np_core::{Error, FitResult, ParameterState, Result};

/// Check for identifiability issues based on the Hessian and uncertainties.
///
/// `hessian` is over the floating parameters named in `param_names`.
/// Returns human-readable warnings (empty if the model is well-identified).
pub fn identifiability_warnings(
    hessian: &DMatrix<f64>,
    param_names: &[&str],
    uncertainties: &[f64],
) -> Vec<String> {
    let n = hessian.nrows();
    let mut warnings = Vec::new();

    if n > 0 {
        let svd = hessian.clone().svd(false, false);
        let svals = &svd.singular_values;
        let s_max = svals.iter().fold(0.0_f64, |a, &b| a.max(b));
        let s_min = svals.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        if s_min > 0.0 {
            let cond = s_max / s_min;
            if cond > 1e8 {
                warnings.push(format!(
                    "Hessian condition number = {:.1e}: model may be poorly identified",
                    cond
                ));
            }
        } else {
            warnings.push("Hessian is singular: model is not identifiable".into());
        }
    }

    for (name, u) in param_names.iter().zip(uncertainties) {
        if !u.is_finite() {
            warnings.push(format!("Parameter '{}': uncertainty is {}", name, u));
        }
    }

    for (i, name) in param_names.iter().enumerate().take(n) {
        if hessian[(i, i)].abs() < 1e-12 {
            warnings.push(format!("Parameter '{}': near-zero Hessian diagonal, not identifiable", name));
        }
    }

    warnings
}

/// NLL of a model as an optimizer objective.
struct ModelObjective<'a, M: LogDensityModel + ?Sized> {
    model: &'a M,
}

impl<M: LogDensityModel + ?Sized> ObjectiveFunction for ModelObjective<'_, M> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.model.nll(params)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.model.grad_nll(params)
    }
}

/// Maximum Likelihood Estimator
///
/// Fits a [`LogDensityModel`] starting from a [`ParameterState`]: constant
/// parameters are held at their state value, everything else floats within
/// its bounds.
#[derive(Debug, Clone, Default)]
pub struct MaximumLikelihoodEstimator {
    config: OptimizerConfig,
}

impl MaximumLikelihoodEstimator {
    /// Create a new MLE with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create MLE with custom optimizer configuration
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Access the optimizer configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fit from the model's initial state.
    pub fn fit(&self, model: &impl LogDensityModel) -> Result<FitResult> {
        self.fit_state(model, &ParameterState::from_model(model))
    }

    /// Fit from `state` with Hesse errors for every floating parameter.
    ///
    /// Constant parameters keep their value and get zero uncertainty.
    pub fn fit_state(
        &self,
        model: &impl LogDensityModel,
        state: &ParameterState,
    ) -> Result<FitResult> {
        let result = self.minimize_state(model, state)?;
        let free = state.floating_indices();
        let n = result.parameters.len();

        let hessian = self.compute_hessian(model, &result.parameters, &state.fit_bounds(), &free)?;
        let k = free.len();
        let diag_uncertainties = self.diagonal_uncertainties(&hessian, k);

        let mut uncertainties = vec![0.0; n];
        let mut covariance = None;
        match self.invert_hessian(&hessian, k) {
            Some(cov_free) => {
                let mut all_variances_ok = true;
                for (a, &i) in free.iter().enumerate() {
                    let var = cov_free[(a, a)];
                    if var.is_finite() && var > 0.0 {
                        uncertainties[i] = var.sqrt();
                    } else {
                        all_variances_ok = false;
                        uncertainties[i] = diag_uncertainties[a];
                    }
                }
                if all_variances_ok {
                    // Row-major N×N, zero rows/columns for constant parameters.
                    let mut cov = vec![0.0; n * n];
                    for (a, &i) in free.iter().enumerate() {
                        for (b, &j) in free.iter().enumerate() {
                            cov[i * n + j] = cov_free[(a, b)];
                        }
                    }
                    covariance = Some(cov);
                } else {
                    log::warn!("Invalid covariance diagonal; omitting covariance matrix");
                }
            }
            None => {
                log::warn!("Hessian inversion failed, using diagonal approximation");
                for (a, &i) in free.iter().enumerate() {
                    uncertainties[i] = diag_uncertainties[a];
                }
            }
        }

        let mut fr = FitResult::new(
            result.parameters,
            uncertainties,
            result.fval,
            result.converged,
            result.n_iter as usize,
            result.n_fev,
            result.n_gev,
        )
        .with_message(result.message);
        fr.covariance = covariance;

        let names: Vec<&str> = free.iter().map(|&i| state.parameters()[i].name.as_str()).collect();
        let free_unc: Vec<f64> = free.iter().map(|&i| fr.uncertainties[i]).collect();
        fr.warnings = identifiability_warnings(&hessian, &names, &free_unc);
        for w in &fr.warnings {
            log::debug!("{}", w);
        }

        Ok(fr)
    }

    /// Minimize NLL from `state` without Hessian (refits, profile-likelihood points).
    pub fn minimize_state(
        &self,
        model: &impl LogDensityModel,
        state: &ParameterState,
    ) -> Result<OptimizationResult> {
        if state.len() != model.dim() {
            return Err(Error::Validation(format!(
                "Parameter state length {} != model.dim() {}",
                state.len(),
                model.dim()
            )));
        }
        let objective = ModelObjective { model };
        let optimizer = LbfgsbOptimizer::new(self.config.clone());
        optimizer.minimize(&objective, &state.values(), &state.fit_bounds())
    }

    /// Finite-difference Hessian over the `free` coordinates.
    fn compute_hessian(
        &self,
        model: &impl LogDensityModel,
        best_params: &[f64],
        bounds: &[(f64, f64)],
        free: &[usize],
    ) -> Result<DMatrix<f64>> {
        let k = free.len();
        let grad_center = model.grad_nll(best_params)?;
        let mut hessian = DMatrix::zeros(k, k);

        for (b, &j) in free.iter().enumerate() {
            let mut eps = 1e-4 * best_params[j].abs().max(1.0);
            // Step inwards when sitting on the upper bound.
            if best_params[j] + eps > bounds[j].1 {
                eps = -eps;
            }

            let mut params_plus = best_params.to_vec();
            params_plus[j] += eps;
            let grad_plus = model.grad_nll(&params_plus)?;

            for (a, &i) in free.iter().enumerate() {
                hessian[(a, b)] = (grad_plus[i] - grad_center[i]) / eps;
            }
        }

        let ht = hessian.transpose();
        hessian = (&hessian + &ht) * 0.5;

        Ok(hessian)
    }

    /// Invert Hessian via damped Cholesky; `None` if no positive variance results.
    fn invert_hessian(&self, hessian: &DMatrix<f64>, n: usize) -> Option<DMatrix<f64>> {
        if n == 0 {
            return Some(DMatrix::zeros(0, 0));
        }
        let identity = DMatrix::identity(n, n);
        let diag_scale = (0..n).map(|i| hessian[(i, i)].abs()).fold(0.0_f64, f64::max).max(1.0);

        let mut h_damped = hessian.clone();
        let mut damping = 0.0_f64;
        let max_attempts = 10;

        for attempt in 0..max_attempts {
            if let Some(chol) = nalgebra::linalg::Cholesky::new(h_damped.clone()) {
                return Some(chol.solve(&identity));
            }
            if attempt + 1 == max_attempts {
                break;
            }
            let next_damping = if damping == 0.0 { diag_scale * 1e-9 } else { damping * 10.0 };
            let add = next_damping - damping;
            for i in 0..n {
                h_damped[(i, i)] += add;
            }
            damping = next_damping;
        }

        let cov = h_damped.lu().try_inverse()?;
        for i in 0..n {
            let v = cov[(i, i)];
            if !(v.is_finite() && v > 0.0) {
                return None;
            }
        }
        Some(cov)
    }

    /// Uncertainties from the Hessian diagonal (fallback).
    fn diagonal_uncertainties(&self, hessian: &DMatrix<f64>, n: usize) -> Vec<f64> {
        (0..n).map(|i| 1.0 / hessian[(i, i)].abs().max(1e-12).sqrt()).collect()
    }
}
