//! Fit engine: the model-side interface used by the impact procedure.
//!
//! A [`FitEngine`] exposes named parameters, the POI and the nuisance
//! parameters, and fits a [`ParameterState`] it receives by reference. It
//! never keeps state between fits, so one engine can serve concurrent
//! refits.

use crate::profile_likelihood::apply_minos;
use crate::MaximumLikelihoodEstimator;
use np_core::traits::{LogDensityModel, PoiModel};
use np_core::{Error, FitResult, ParameterState, Result};

/// Which errors a fit should compute.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorMode {
    /// Minimum only; uncertainties are zero
    None,
    /// Symmetric errors from the inverse Hessian
    Hesse,
    /// Hesse errors, then profile-likelihood errors for these parameter indices
    Minos(Vec<usize>),
}

/// Fitting interface consumed by [`crate::impact`].
pub trait FitEngine: Send + Sync {
    /// Initial parameter state (model init values and configured constant flags).
    fn initial_state(&self) -> ParameterState;

    /// POI name.
    fn poi_name(&self) -> &str;

    /// Nuisance parameters in model order: every non-POI parameter not held
    /// constant by the model configuration.
    fn nuisance_names(&self) -> Vec<String>;

    /// Gaussian prior `(center, width)` of a parameter, if it has one.
    fn prior(&self, _name: &str) -> Option<(f64, f64)> {
        None
    }

    /// Fit starting from `state`. Constant parameters stay at their value.
    fn fit(&self, state: &ParameterState, errors: &ErrorMode) -> Result<FitResult>;
}

/// [`FitEngine`] backed by a [`LogDensityModel`] and the L-BFGS estimator.
#[derive(Debug, Clone)]
pub struct MleEngine<M> {
    model: M,
    mle: MaximumLikelihoodEstimator,
    poi_name: String,
    nuisance: Vec<String>,
    priors: Vec<Option<(f64, f64)>>,
}

impl<M: LogDensityModel + PoiModel> MleEngine<M> {
    /// Wrap a model. Fails if the model has no POI.
    pub fn new(model: M, mle: MaximumLikelihoodEstimator) -> Result<Self> {
        let poi = model
            .poi_index()
            .ok_or_else(|| Error::Configuration("Model defines no POI".to_string()))?;
        let names = model.parameter_names();
        let fixed = model.parameter_fixed();
        let poi_name = names[poi].clone();
        let nuisance = names
            .iter()
            .zip(&fixed)
            .enumerate()
            .filter(|(i, (_, fixed))| *i != poi && !**fixed)
            .map(|(_, (name, _))| name.clone())
            .collect();
        let priors = model.parameter_priors();
        Ok(Self { model, mle, poi_name, nuisance, priors })
    }

    /// Underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Estimator in use.
    pub fn estimator(&self) -> &MaximumLikelihoodEstimator {
        &self.mle
    }
}

impl<M: LogDensityModel + PoiModel> FitEngine for MleEngine<M> {
    fn initial_state(&self) -> ParameterState {
        ParameterState::from_model(&self.model)
    }

    fn poi_name(&self) -> &str {
        &self.poi_name
    }

    fn nuisance_names(&self) -> Vec<String> {
        self.nuisance.clone()
    }

    fn prior(&self, name: &str) -> Option<(f64, f64)> {
        let idx = self.model.parameter_names().iter().position(|n| n == name)?;
        self.priors.get(idx).copied().flatten()
    }

    fn fit(&self, state: &ParameterState, errors: &ErrorMode) -> Result<FitResult> {
        match errors {
            ErrorMode::None => {
                let res = self.mle.minimize_state(&self.model, state)?;
                let n = res.parameters.len();
                Ok(FitResult::new(
                    res.parameters,
                    vec![0.0; n],
                    res.fval,
                    res.converged,
                    res.n_iter as usize,
                    res.n_fev,
                    res.n_gev,
                )
                .with_message(res.message))
            }
            ErrorMode::Hesse => self.mle.fit_state(&self.model, state),
            ErrorMode::Minos(indices) => {
                let mut fit = self.mle.fit_state(&self.model, state)?;
                apply_minos(&self.mle, &self.model, state, &mut fit, indices)?;
                Ok(fit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use np_translate::pyhf::HistFactoryModel;
    use np_translate::pyhf::simplemodels::{NormSystematic, signal_background};

    fn engine() -> MleEngine<HistFactoryModel> {
        let ws = signal_background(
            &[5.0, 10.0],
            &[50.0, 60.0],
            &[56.0, 71.0],
            &[NormSystematic::symmetric("alpha_bkg", 0.1)],
            true,
        );
        let model = HistFactoryModel::from_workspace(&ws).unwrap();
        MleEngine::new(model, MaximumLikelihoodEstimator::new()).unwrap()
    }

    #[test]
    fn test_names_and_priors() {
        let e = engine();
        assert_eq!(e.poi_name(), "mu");
        assert_eq!(e.nuisance_names(), vec!["alpha_bkg", "mu_bkg"]);
        assert_eq!(e.prior("alpha_bkg"), Some((0.0, 1.0)));
        assert_eq!(e.prior("mu_bkg"), None);
        assert_eq!(e.prior("unknown"), None);
    }

    #[test]
    fn test_fit_modes() {
        let e = engine();
        let mut state = e.initial_state();
        state.set_value("mu_bkg", 1.0).unwrap();
        state.set_constant("mu_bkg", true).unwrap();

        let fast = e.fit(&state, &ErrorMode::None).unwrap();
        assert!(fast.uncertainties.iter().all(|&u| u == 0.0));

        let hesse = e.fit(&state, &ErrorMode::Hesse).unwrap();
        assert!(hesse.uncertainties[0] > 0.0);
        assert_eq!(hesse.uncertainties[2], 0.0);
        assert_eq!(hesse.parameters[2], 1.0);
        assert!((fast.parameters[0] - hesse.parameters[0]).abs() < 1e-9);
    }
}
