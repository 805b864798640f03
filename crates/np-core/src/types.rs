//! Common data types for npimpact

use serde::{Deserialize, Serialize};

/// Fit result containing parameter estimates and uncertainties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Symmetric parameter uncertainties (sqrt of covariance diagonal).
    /// Zero for parameters held constant during the fit.
    pub uncertainties: Vec<f64>,

    /// Upper errors (`>= 0`). Equal to `uncertainties` unless profile-likelihood
    /// errors were computed for that parameter.
    pub errors_hi: Vec<f64>,

    /// Lower errors, signed (`<= 0`).
    pub errors_lo: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if Hessian inversion failed
    /// or the fit skipped the Hessian.
    pub covariance: Option<Vec<f64>>,

    /// Negative log-likelihood at minimum
    pub nll: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of optimizer iterations
    pub n_iter: usize,

    /// Number of objective evaluations
    pub n_fev: usize,

    /// Number of gradient evaluations
    pub n_gev: usize,

    /// Optimizer termination message
    #[serde(default)]
    pub message: String,

    /// Fit quality warnings (identifiability, fallbacks)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl FitResult {
    /// Create a new fit result with symmetric errors
    pub fn new(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        nll: f64,
        converged: bool,
        n_iter: usize,
        n_fev: usize,
        n_gev: usize,
    ) -> Self {
        let errors_hi = uncertainties.clone();
        let errors_lo = uncertainties.iter().map(|u| -u).collect();
        Self {
            parameters,
            uncertainties,
            errors_hi,
            errors_lo,
            covariance: None,
            nll,
            converged,
            n_iter,
            n_fev,
            n_gev,
            message: String::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a fit result with covariance matrix
    #[allow(clippy::too_many_arguments)]
    pub fn with_covariance(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        covariance: Vec<f64>,
        nll: f64,
        converged: bool,
        n_iter: usize,
        n_fev: usize,
        n_gev: usize,
    ) -> Self {
        let mut out = Self::new(parameters, uncertainties, nll, converged, n_iter, n_fev, n_gev);
        out.covariance = Some(covariance);
        out
    }

    /// Attach the optimizer termination message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Overwrite the asymmetric errors of one parameter.
    ///
    /// `lo` is stored signed; a positive value is negated.
    pub fn set_asymmetric_error(&mut self, idx: usize, hi: f64, lo: f64) {
        if idx < self.errors_hi.len() {
            self.errors_hi[idx] = hi.abs();
            self.errors_lo[idx] = -lo.abs();
        }
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.parameters.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = self.uncertainties[i];
        let sigma_j = self.uncertainties[j];
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[i * n + j] / (sigma_i * sigma_j))
    }
}
