//! Bounded L-BFGS minimization on top of argmin.
//!
//! Parameters whose bounds collapse to a single point (`lo == hi`) are held
//! constant: they are removed from the problem handed to argmin and put
//! back into the result, so the solver only ever sees free coordinates.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use np_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// L-BFGS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for gradient norm
    pub tol: f64,
    /// Number of corrections to approximate inverse Hessian
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

/// Result of one minimization.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters, full length (held parameters included)
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective evaluations
    pub n_fev: usize,
    /// Number of gradient evaluations
    pub n_gev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

/// Objective function for the optimizer.
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate function at given parameters
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Gradient (central differences unless overridden)
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut grad = vec![0.0; params.len()];
        let mut p = params.to_vec();
        for i in 0..params.len() {
            let eps = 1e-8 * params[i].abs().max(1.0);
            p[i] = params[i] + eps;
            let f_plus = self.eval(&p)?;
            p[i] = params[i] - eps;
            let f_minus = self.eval(&p)?;
            p[i] = params[i];
            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }
        Ok(grad)
    }
}

/// Maps between the full parameter vector and its free coordinates.
#[derive(Debug, Clone)]
struct FreeMap {
    full: Vec<f64>,
    free: Vec<usize>,
    bounds: Vec<(f64, f64)>,
}

impl FreeMap {
    fn new(init: &[f64], bounds: &[(f64, f64)]) -> Self {
        let full = clamp_params(init, bounds);
        let free: Vec<usize> = bounds
            .iter()
            .enumerate()
            .filter(|(_, (lo, hi))| lo < hi)
            .map(|(i, _)| i)
            .collect();
        let free_bounds = free.iter().map(|&i| bounds[i]).collect();
        Self { full, free, bounds: free_bounds }
    }

    fn reduce(&self) -> Vec<f64> {
        self.free.iter().map(|&i| self.full[i]).collect()
    }

    fn expand(&self, reduced: &[f64]) -> Vec<f64> {
        let mut full = self.full.clone();
        for (&i, (&v, &(lo, hi))) in self.free.iter().zip(reduced.iter().zip(&self.bounds)) {
            full[i] = v.clamp(lo, hi);
        }
        full
    }
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Adapter presenting the free coordinates of an objective to argmin.
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    map: &'a FreeMap,
    counts: Arc<FuncCounts>,
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        self.objective
            .eval(&self.map.expand(params))
            .map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let full = self.map.expand(params);
        let full_grad = self
            .objective
            .gradient(&full)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;

        // Projected gradient: at an active bound, drop the component pointing outside.
        const EPS: f64 = 1e-12;
        let g = self
            .map
            .free
            .iter()
            .zip(&self.map.bounds)
            .map(|(&i, &(lo, hi))| {
                let (x, g) = (full[i], full_grad[i]);
                if (x <= lo + EPS && g > 0.0) || (x >= hi - EPS && g < 0.0) { 0.0 } else { g }
            })
            .collect();
        Ok(g)
    }
}

/// L-BFGS optimizer with box constraints (clamp + projected gradient).
#[derive(Debug, Clone, Default)]
pub struct LbfgsbOptimizer {
    config: OptimizerConfig,
}

impl LbfgsbOptimizer {
    /// Create new optimizer with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Minimize `objective` from `init_params` within `bounds`.
    ///
    /// Coordinates with `lo == hi` stay at that value. If every coordinate
    /// is held, the objective is evaluated once and the result reports
    /// convergence.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }
        if let Some((i, (lo, hi))) = bounds.iter().enumerate().find(|(_, (lo, hi))| lo > hi) {
            return Err(Error::Validation(format!(
                "Invalid bounds for parameter {}: ({}, {})",
                i, lo, hi
            )));
        }

        let map = FreeMap::new(init_params, bounds);
        if map.free.is_empty() {
            let fval = objective.eval(&map.full)?;
            return Ok(OptimizationResult {
                parameters: map.full,
                fval,
                n_iter: 0,
                n_fev: 1,
                n_gev: 0,
                converged: true,
                message: "No free parameters".to_string(),
            });
        }

        let counts = Arc::new(FuncCounts::default());
        let problem = ArgminProblem { objective, map: &map, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // argmin's default cost tolerance (~EPS) is too strict for NLL scales.
        let tol_cost =
            if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Validation(format!("Invalid optimizer configuration (tol): {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| {
                Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}"))
            })?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(map.reduce()).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("Optimization failed: {}", e)))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("No best parameters found".to_string()))?;
        let parameters = map.expand(best);
        let fval = state.get_best_cost();
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(OptimizationResult {
            parameters,
            fval,
            n_iter: state.get_iter(),
            n_fev: counts.cost.load(Ordering::Relaxed),
            n_gev: counts.grad.load(Ordering::Relaxed),
            converged,
            message: termination.to_string(),
        })
    }
}
