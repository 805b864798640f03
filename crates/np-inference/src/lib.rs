//! # np-inference
//!
//! Fitting and impact ranking for npimpact.
//!
//! This crate provides:
//! - Bounded L-BFGS minimization (argmin)
//! - Maximum Likelihood Estimation with Hesse and Minos-style errors
//! - The `FitEngine` seam and the nuisance-parameter impact procedure
//!
//! Everything here works on `np_core` traits and `ParameterState`s;
//! `MleEngine` wraps any `LogDensityModel + PoiModel`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Fit engine trait and the MLE-backed implementation.
pub mod engine;
/// Nominal fit, per-NP refits and the impact report.
pub mod impact;
/// Maximum-likelihood estimation via L-BFGS.
pub mod mle;
/// Generic numerical optimizer (L-BFGS backend).
pub mod optimizer;
/// Profile-likelihood (Minos-style) asymmetric errors.
pub mod profile_likelihood;

pub use engine::{ErrorMode, FitEngine, MleEngine};
pub use impact::{
    ImpactConfig, ImpactOrder, ImpactReport, ImpactResult, NominalFit, NuisanceFilter,
    ShiftOutcome, Variation, nominal_fit, rank_impacts,
};
pub use mle::MaximumLikelihoodEstimator;
pub use optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use profile_likelihood::MinosError;
