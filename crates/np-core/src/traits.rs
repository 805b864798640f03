//! Core traits for npimpact
//!
//! Inference code (fits, impact ranking) depends on these traits, never on a
//! concrete model type.

use crate::Result;

/// Universal model interface for likelihood fits.
pub trait LogDensityModel: Send + Sync {
    /// Number of parameters.
    fn dim(&self) -> usize;

    /// Parameter names (stable order).
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds (min, max) (stable order).
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Suggested initial values (stable order).
    fn parameter_init(&self) -> Vec<f64>;

    /// Parameters held constant by the model configuration.
    fn parameter_fixed(&self) -> Vec<bool> {
        vec![false; self.dim()]
    }

    /// Gaussian prior `(center, width)` per parameter, if any.
    fn parameter_priors(&self) -> Vec<Option<(f64, f64)>> {
        vec![None; self.dim()]
    }

    /// Negative log-likelihood.
    fn nll(&self, params: &[f64]) -> Result<f64>;

    /// Gradient of NLL.
    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>>;
}

/// Optional extension: parameter-of-interest (POI) index.
pub trait PoiModel: Send + Sync {
    /// Index of POI in the model's parameter order.
    fn poi_index(&self) -> Option<usize>;
}
