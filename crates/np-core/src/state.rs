//! Parameter state and snapshots.
//!
//! A [`ParameterState`] is the full, ordered set of parameters a fit starts
//! from: value, constant flag, bounds and (after a fit) asymmetric errors.
//! Fits never mutate a state they did not receive by value; every refit
//! starts from a copy restored out of an immutable [`Snapshot`].

use crate::{Error, FitResult, LogDensityModel, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One named parameter inside a [`ParameterState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    /// Parameter name
    pub name: String,
    /// Current value
    pub value: f64,
    /// Held constant (excluded from the floating set) during fits
    pub constant: bool,
    /// Bounds (min, max)
    pub bounds: (f64, f64),
    /// Upper error from the last fit (`>= 0`)
    pub error_hi: Option<f64>,
    /// Lower error from the last fit, signed (`<= 0`)
    pub error_lo: Option<f64>,
}

/// Ordered parameter state of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    params: Vec<ParameterValue>,
}

impl ParameterState {
    /// Build a state from explicit parameter entries.
    pub fn new(params: Vec<ParameterValue>) -> Self {
        Self { params }
    }

    /// Initial state of a model: init values, configured constant flags, no errors.
    pub fn from_model(model: &impl LogDensityModel) -> Self {
        let params = model
            .parameter_names()
            .into_iter()
            .zip(model.parameter_init())
            .zip(model.parameter_bounds())
            .zip(model.parameter_fixed())
            .map(|(((name, value), bounds), constant)| ParameterValue {
                name,
                value,
                constant,
                bounds,
                error_hi: None,
                error_lo: None,
            })
            .collect();
        Self { params }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// `true` if the state holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All parameters in model order.
    pub fn parameters(&self) -> &[ParameterValue] {
        &self.params
    }

    /// Index of a parameter by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.params.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut ParameterValue> {
        self.params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::Validation(format!("Unknown parameter '{}'", name)))
    }

    /// Set the value of a parameter.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        self.get_mut(name)?.value = value;
        Ok(())
    }

    /// Fix or release a parameter.
    pub fn set_constant(&mut self, name: &str, constant: bool) -> Result<()> {
        self.get_mut(name)?.constant = constant;
        Ok(())
    }

    /// Values in model order.
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    /// Bounds as seen by the optimizer: constant parameters collapse to `(v, v)`.
    pub fn fit_bounds(&self) -> Vec<(f64, f64)> {
        self.params.iter().map(|p| if p.constant { (p.value, p.value) } else { p.bounds }).collect()
    }

    /// Indices of floating parameters.
    pub fn floating_indices(&self) -> Vec<usize> {
        self.params.iter().enumerate().filter(|(_, p)| !p.constant).map(|(i, _)| i).collect()
    }

    /// Copy best-fit values and errors of the floating parameters from a fit.
    ///
    /// Constant parameters keep their value and error fields.
    pub fn apply_fit(&mut self, fit: &FitResult) -> Result<()> {
        if fit.parameters.len() != self.params.len() {
            return Err(Error::Validation(format!(
                "Fit result length mismatch: state has {}, fit has {}",
                self.params.len(),
                fit.parameters.len()
            )));
        }
        for (i, p) in self.params.iter_mut().enumerate() {
            if p.constant {
                continue;
            }
            p.value = fit.parameters[i];
            p.error_hi = fit.errors_hi.get(i).copied();
            p.error_lo = fit.errors_lo.get(i).copied();
        }
        Ok(())
    }

    /// Freeze this state into an immutable, labeled snapshot.
    pub fn snapshot(&self, label: impl Into<String>) -> Snapshot {
        Snapshot { label: label.into(), state: Arc::new(self.clone()) }
    }
}

/// Immutable checkpoint of a [`ParameterState`].
///
/// Cheap to clone and share across threads; the captured state can only be
/// read or copied out via [`Snapshot::restore`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    label: String,
    state: Arc<ParameterState>,
}

impl Snapshot {
    /// Snapshot label (e.g. `"nominal"`).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read-only view of the captured state.
    pub fn state(&self) -> &ParameterState {
        &self.state
    }

    /// Look up a captured parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.state.get(name)
    }

    /// Fresh, independently owned copy of the captured state.
    pub fn restore(&self) -> ParameterState {
        ParameterState::clone(&self.state)
    }
}
