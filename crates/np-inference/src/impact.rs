//! Nuisance-parameter impact ranking.
//!
//! One unconditional nominal fit is frozen into a `"nominal"` snapshot.
//! Every eligible nuisance parameter is then refit four times, each refit
//! starting from a fresh copy of that snapshot with only the parameter under
//! test moved and held constant:
//!
//! | variation    | value                      |
//! |--------------|----------------------------|
//! | post-fit up  | `θ̂ + err_hi`               |
//! | post-fit down| `θ̂ + err_lo` (signed, < 0) |
//! | pre-fit up   | `θ̂ + step`                 |
//! | pre-fit down | `θ̂ - step`                 |
//!
//! and the POI shift relative to the nominal best fit is recorded. A failed
//! or non-converged refit only makes that one shift unavailable.

use crate::engine::{ErrorMode, FitEngine};
use np_core::{Error, ParameterState, ParameterValue, Result, Snapshot};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default marker substring for nuisance parameter names.
pub const DEFAULT_NP_MARKER: &str = "alpha_";

/// Label of the nominal snapshot.
pub const NOMINAL_SNAPSHOT: &str = "nominal";

/// Selects nuisance parameters whose name contains a marker substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NuisanceFilter {
    marker: String,
}

impl NuisanceFilter {
    /// Filter on `marker`.
    pub fn new(marker: impl Into<String>) -> Self {
        Self { marker: marker.into() }
    }

    /// Marker substring.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// `true` if `name` carries the marker.
    pub fn matches(&self, name: &str) -> bool {
        name.contains(&self.marker)
    }

    /// Eligible names in input order; the POI is never eligible.
    pub fn select(&self, names: &[String], poi: &str) -> Vec<String> {
        names.iter().filter(|n| n.as_str() != poi && self.matches(n)).cloned().collect()
    }
}

impl Default for NuisanceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NP_MARKER)
    }
}

/// Ordering of the impact list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactOrder {
    /// Model parameter order
    #[default]
    Model,
    /// Descending largest absolute shift, ties by name
    Impact,
}

impl std::str::FromStr for ImpactOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "model" => Ok(Self::Model),
            "impact" => Ok(Self::Impact),
            other => Err(Error::Configuration(format!(
                "Unknown order '{}' (expected 'model' or 'impact')",
                other
            ))),
        }
    }
}

/// Options of the impact procedure.
#[derive(Debug, Clone)]
pub struct ImpactConfig {
    /// NP eligibility filter
    pub filter: NuisanceFilter,
    /// Pre-fit perturbation size
    pub prefit_step: f64,
    /// Profile-likelihood errors for the POI and eligible NPs
    pub minos: bool,
    /// Trust non-converged fits (warn instead of failing)
    pub accept_unconverged: bool,
    /// Output ordering
    pub order: ImpactOrder,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            filter: NuisanceFilter::default(),
            prefit_step: 1.0,
            minos: false,
            accept_unconverged: false,
            order: ImpactOrder::Model,
        }
    }
}

/// Outcome of the nominal fit.
#[derive(Debug, Clone)]
pub struct NominalFit {
    /// POI name
    pub poi: String,
    /// POI best fit
    pub mu_hat: f64,
    /// POI upper error (`>= 0`)
    pub err_hi: f64,
    /// POI lower error, signed (`<= 0`)
    pub err_lo: f64,
    /// Fit convergence
    pub converged: bool,
    /// NLL at the minimum
    pub nll: f64,
    /// Fitted state, read-only
    pub snapshot: Snapshot,
}

/// Run the nominal fit with a floating POI and freeze the result.
///
/// `eligible` names the parameters that get profile-likelihood errors when
/// `config.minos` is set (the POI always does).
pub fn nominal_fit(
    engine: &impl FitEngine,
    config: &ImpactConfig,
    eligible: &[String],
) -> Result<NominalFit> {
    let poi = engine.poi_name().to_string();
    let mut state = engine.initial_state();
    state.set_constant(&poi, false)?;

    let errors = if config.minos {
        let indices = std::iter::once(poi.as_str())
            .chain(eligible.iter().map(String::as_str))
            .filter_map(|n| state.index_of(n))
            .collect();
        ErrorMode::Minos(indices)
    } else {
        ErrorMode::Hesse
    };

    let fit = engine.fit(&state, &errors)?;
    if !fit.converged {
        if !config.accept_unconverged {
            return Err(Error::Convergence(format!("nominal fit: {}", fit.message)));
        }
        log::warn!("Nominal fit did not converge ({}); continuing as requested", fit.message);
    }
    for w in &fit.warnings {
        log::warn!("nominal fit: {}", w);
    }

    state.apply_fit(&fit)?;
    let snapshot = state.snapshot(NOMINAL_SNAPSHOT);
    let p = snapshot
        .get(&poi)
        .ok_or_else(|| Error::Computation(format!("POI '{}' missing after fit", poi)))?;
    let (mu_hat, err_hi, err_lo) =
        (p.value, p.error_hi.unwrap_or(f64::NAN), p.error_lo.unwrap_or(f64::NAN));
    log::info!("nominal fit: {} = {:+.3} {:+.3} / {:+.3}", poi, mu_hat, err_hi, err_lo);

    Ok(NominalFit { poi, mu_hat, err_hi, err_lo, converged: fit.converged, nll: fit.nll, snapshot })
}

/// One perturbation of a nuisance parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variation {
    /// `θ̂ + err_hi`
    PostfitUp,
    /// `θ̂ + err_lo`
    PostfitDown,
    /// `θ̂ + step`
    PrefitUp,
    /// `θ̂ - step`
    PrefitDown,
}

impl Variation {
    /// All variations in evaluation order.
    pub const ALL: [Variation; 4] =
        [Variation::PostfitUp, Variation::PostfitDown, Variation::PrefitUp, Variation::PrefitDown];

    /// Perturbed value of `np`, clamped to its bounds.
    pub fn target(self, np: &ParameterValue, prefit_step: f64) -> Result<f64> {
        let missing = || Error::Computation(format!("No post-fit error for '{}'", np.name));
        let raw = match self {
            Variation::PostfitUp => np.value + np.error_hi.ok_or_else(missing)?,
            Variation::PostfitDown => np.value + np.error_lo.ok_or_else(missing)?,
            Variation::PrefitUp => np.value + prefit_step,
            Variation::PrefitDown => np.value - prefit_step,
        };
        if !raw.is_finite() {
            return Err(Error::Computation(format!("Non-finite {} value for '{}'", self, np.name)));
        }
        let (lo, hi) = np.bounds;
        let clamped = raw.clamp(lo, hi);
        if clamped != raw {
            log::debug!("{} of '{}' clamped from {} to {}", self, np.name, raw, clamped);
        }
        Ok(clamped)
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variation::PostfitUp => "post-fit up",
            Variation::PostfitDown => "post-fit down",
            Variation::PrefitUp => "pre-fit up",
            Variation::PrefitDown => "pre-fit down",
        })
    }
}

/// POI shift of one refit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ShiftOutcome {
    /// Refit succeeded
    #[serde(rename = "ok")]
    Shifted {
        /// POI best fit of the refit
        mu: f64,
        /// `mu - mu_hat`
        delta: f64,
    },
    /// Refit failed or did not converge
    #[serde(rename = "unavailable")]
    Unavailable {
        /// Failure description
        reason: String,
    },
}

impl ShiftOutcome {
    /// The shift, if available.
    pub fn delta(&self) -> Option<f64> {
        match self {
            ShiftOutcome::Shifted { delta, .. } => Some(*delta),
            ShiftOutcome::Unavailable { .. } => None,
        }
    }

    /// `true` if the refit produced a shift.
    pub fn is_available(&self) -> bool {
        self.delta().is_some()
    }
}

/// Impact of one nuisance parameter on the POI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    /// NP name
    pub name: String,
    /// NP best fit in the nominal fit
    pub nominal_value: f64,
    /// NP upper post-fit error
    pub error_hi: Option<f64>,
    /// NP lower post-fit error (signed)
    pub error_lo: Option<f64>,
    /// Shift with the NP at `θ̂ + step`
    pub prefit_up: ShiftOutcome,
    /// Shift with the NP at `θ̂ - step`
    pub prefit_down: ShiftOutcome,
    /// Shift with the NP at `θ̂ + err_hi`
    pub postfit_up: ShiftOutcome,
    /// Shift with the NP at `θ̂ + err_lo`
    pub postfit_down: ShiftOutcome,
    /// `(θ̂ - θ₀) / σ₀` for NPs with a Gaussian prior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull: Option<f64>,
    /// `σ̂ / σ₀` for NPs with a Gaussian prior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<f64>,
}

impl ImpactResult {
    /// Shift of a given variation.
    pub fn shift(&self, variation: Variation) -> &ShiftOutcome {
        match variation {
            Variation::PostfitUp => &self.postfit_up,
            Variation::PostfitDown => &self.postfit_down,
            Variation::PrefitUp => &self.prefit_up,
            Variation::PrefitDown => &self.prefit_down,
        }
    }

    /// Largest absolute available shift (0 if none).
    pub fn max_abs_impact(&self) -> f64 {
        Variation::ALL
            .iter()
            .filter_map(|v| self.shift(*v).delta())
            .fold(0.0_f64, |acc, d| acc.max(d.abs()))
    }

    /// Number of unavailable shifts.
    pub fn n_unavailable(&self) -> usize {
        Variation::ALL.iter().filter(|v| !self.shift(**v).is_available()).count()
    }
}

/// Result of a full impact ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    /// POI name
    pub poi: String,
    /// Nominal POI best fit
    pub mu_hat: f64,
    /// Nominal POI upper error
    pub err_hi: f64,
    /// Nominal POI lower error (signed)
    pub err_lo: f64,
    /// Nominal fit convergence
    pub nominal_converged: bool,
    /// NP marker substring
    pub filter: String,
    /// Per-NP impacts
    pub impacts: Vec<ImpactResult>,
    /// Unavailable shifts across all NPs
    pub n_unavailable: usize,
}

/// Refit with `np` moved by `variation` and held constant.
///
/// Never fails: errors become [`ShiftOutcome::Unavailable`].
pub fn refit_shift(
    engine: &impl FitEngine,
    nominal: &NominalFit,
    np: &str,
    variation: Variation,
    config: &ImpactConfig,
) -> ShiftOutcome {
    match try_refit(engine, nominal, np, variation, config) {
        Ok(mu) => ShiftOutcome::Shifted { mu, delta: mu - nominal.mu_hat },
        Err(e) => {
            log::warn!("{} refit of '{}' unavailable: {}", variation, np, e);
            ShiftOutcome::Unavailable { reason: e.to_string() }
        }
    }
}

fn try_refit(
    engine: &impl FitEngine,
    nominal: &NominalFit,
    np: &str,
    variation: Variation,
    config: &ImpactConfig,
) -> Result<f64> {
    let mut state: ParameterState = nominal.snapshot.restore();
    let current = state
        .get(np)
        .ok_or_else(|| Error::Validation(format!("Unknown nuisance parameter '{}'", np)))?;
    let value = variation.target(current, config.prefit_step)?;
    state.set_value(np, value)?;
    state.set_constant(np, true)?;

    let fit = engine.fit(&state, &ErrorMode::None)?;
    if !fit.converged {
        if !config.accept_unconverged {
            return Err(Error::Convergence(fit.message));
        }
        log::warn!("{} refit of '{}' did not converge; using it anyway", variation, np);
    }
    let poi_idx = state
        .index_of(&nominal.poi)
        .ok_or_else(|| Error::Computation(format!("POI '{}' missing from state", nominal.poi)))?;
    fit.parameters
        .get(poi_idx)
        .copied()
        .ok_or_else(|| Error::Computation("Fit result shorter than parameter state".to_string()))
}

/// All four shifts of one nuisance parameter.
pub fn evaluate_np(
    engine: &impl FitEngine,
    nominal: &NominalFit,
    np: &str,
    config: &ImpactConfig,
) -> Result<ImpactResult> {
    let p = nominal
        .snapshot
        .get(np)
        .ok_or_else(|| Error::Validation(format!("Unknown nuisance parameter '{}'", np)))?;

    let shift = |v| refit_shift(engine, nominal, np, v, config);
    let (pull, constraint) = match engine.prior(np) {
        Some((center, width)) if width > 0.0 => {
            let sigma_hat = match (p.error_hi, p.error_lo) {
                (Some(hi), Some(lo)) => Some(0.5 * (hi - lo)),
                _ => None,
            };
            (Some((p.value - center) / width), sigma_hat.map(|s| s / width))
        }
        _ => (None, None),
    };

    Ok(ImpactResult {
        name: np.to_string(),
        nominal_value: p.value,
        error_hi: p.error_hi,
        error_lo: p.error_lo,
        postfit_up: shift(Variation::PostfitUp),
        postfit_down: shift(Variation::PostfitDown),
        prefit_up: shift(Variation::PrefitUp),
        prefit_down: shift(Variation::PrefitDown),
        pull,
        constraint,
    })
}

/// Nominal fit, then impacts of every eligible nuisance parameter.
///
/// NPs are evaluated on the current rayon pool; results come back in model
/// order unless `config.order` asks for impact order.
pub fn rank_impacts(engine: &impl FitEngine, config: &ImpactConfig) -> Result<ImpactReport> {
    let eligible = config.filter.select(&engine.nuisance_names(), engine.poi_name());
    let nominal = nominal_fit(engine, config, &eligible)?;

    if eligible.is_empty() {
        log::warn!("No nuisance parameters matched filter '{}'", config.filter.marker());
    } else {
        log::info!("evaluating {} nuisance parameter(s)", eligible.len());
    }

    let mut impacts = eligible
        .par_iter()
        .map(|np| evaluate_np(engine, &nominal, np, config))
        .collect::<Result<Vec<_>>>()?;

    if config.order == ImpactOrder::Impact {
        impacts.sort_by(|a, b| {
            b.max_abs_impact()
                .partial_cmp(&a.max_abs_impact())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    let n_unavailable = impacts.iter().map(ImpactResult::n_unavailable).sum();
    if n_unavailable > 0 {
        log::warn!("{} shift(s) unavailable due to refit failures", n_unavailable);
    }

    Ok(ImpactReport {
        poi: nominal.poi.clone(),
        mu_hat: nominal.mu_hat,
        err_hi: nominal.err_hi,
        err_lo: nominal.err_lo,
        nominal_converged: nominal.converged,
        filter: config.filter.marker().to_string(),
        impacts,
        n_unavailable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use np_core::FitResult;
    use std::sync::Mutex;

    /// Linear-response engine: with every NP floating the fit returns the
    /// configured best fit; each constant NP moves the POI by
    /// `slope * (value - best)`.
    struct MockEngine {
        names: Vec<&'static str>,
        best: Vec<f64>,
        errors: Vec<(f64, f64)>,
        slopes: Vec<f64>,
        fixed: Vec<bool>,
        /// Refits with this NP constant do not converge.
        broken: Option<&'static str>,
        nominal_converges: bool,
        seen: Mutex<Vec<ParameterState>>,
    }

    impl MockEngine {
        fn new() -> Self {
            Self {
                names: vec!["mu", "alpha_test", "alpha_jes1", "mu_ttH"],
                best: vec![1.0, 0.0, 0.2, 1.1],
                errors: vec![(0.20, -0.18), (0.9, -0.9), (0.8, -0.7), (0.3, -0.3)],
                slopes: vec![0.0, 0.05, -0.1, 0.2],
                fixed: vec![false; 4],
                broken: None,
                nominal_converges: true,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl FitEngine for MockEngine {
        fn initial_state(&self) -> ParameterState {
            ParameterState::new(
                self.names
                    .iter()
                    .zip(&self.fixed)
                    .map(|(n, &constant)| ParameterValue {
                        name: n.to_string(),
                        value: if n.starts_with("mu") { 1.0 } else { 0.0 },
                        constant,
                        bounds: (-5.0, 5.0),
                        error_hi: None,
                        error_lo: None,
                    })
                    .collect(),
            )
        }

        fn poi_name(&self) -> &str {
            "mu"
        }

        fn nuisance_names(&self) -> Vec<String> {
            self.names
                .iter()
                .zip(&self.fixed)
                .skip(1)
                .filter(|(_, f)| !**f)
                .map(|(n, _)| n.to_string())
                .collect()
        }

        fn prior(&self, name: &str) -> Option<(f64, f64)> {
            name.starts_with("alpha_").then_some((0.0, 1.0))
        }

        fn fit(&self, state: &ParameterState, errors: &ErrorMode) -> Result<FitResult> {
            self.seen.lock().unwrap().push(state.clone());
            let p = state.parameters();
            let mut values = self.best.clone();
            let mut mu = self.best[0];
            let mut converged = true;
            for i in 1..p.len() {
                if p[i].constant {
                    values[i] = p[i].value;
                    mu += self.slopes[i] * (p[i].value - self.best[i]);
                    if self.broken == Some(self.names[i]) {
                        converged = false;
                    }
                }
            }
            values[0] = mu;
            if *errors != ErrorMode::None && !self.nominal_converges {
                converged = false;
            }
            let mut fit = FitResult::new(values, vec![0.0; p.len()], 0.0, converged, 1, 1, 1);
            if *errors != ErrorMode::None {
                for (i, (hi, lo)) in self.errors.iter().enumerate() {
                    fit.uncertainties[i] = 0.5 * (hi - lo);
                    fit.set_asymmetric_error(i, *hi, *lo);
                }
            }
            Ok(fit)
        }
    }

    fn delta(s: &ShiftOutcome) -> f64 {
        s.delta().expect("shift should be available")
    }

    #[test]
    fn test_filter_selection() {
        let f = NuisanceFilter::default();
        assert!(f.matches("alpha_jes1"));
        assert!(!f.matches("mu_ttH"));
        let names: Vec<String> =
            ["alpha_jes1", "mu_ttH", "lumi", "alpha_x"].iter().map(|s| s.to_string()).collect();
        assert_eq!(f.select(&names, "mu"), vec!["alpha_jes1", "alpha_x"]);
        // The POI is never eligible, even if it carries the marker.
        assert_eq!(f.select(&names, "alpha_x"), vec!["alpha_jes1"]);
        assert_eq!(NuisanceFilter::new("jes").select(&names, "mu"), vec!["alpha_jes1"]);
    }

    #[test]
    fn test_end_to_end_mock() {
        let engine = MockEngine::new();
        let report = rank_impacts(&engine, &ImpactConfig::default()).unwrap();

        assert_eq!(report.poi, "mu");
        assert_relative_eq!(report.mu_hat, 1.00);
        assert_relative_eq!(report.err_hi, 0.20);
        assert_relative_eq!(report.err_lo, -0.18);
        assert!(report.nominal_converged);
        assert_eq!(report.n_unavailable, 0);

        let names: Vec<&str> = report.impacts.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha_test", "alpha_jes1"]);

        let t = &report.impacts[0];
        assert_relative_eq!(delta(&t.prefit_up), 0.05, epsilon = 1e-12);
        assert_relative_eq!(delta(&t.prefit_down), -0.05, epsilon = 1e-12);
        assert_relative_eq!(delta(&t.postfit_up), 0.045, epsilon = 1e-12);
        assert_relative_eq!(delta(&t.postfit_down), -0.045, epsilon = 1e-12);
        assert_eq!(t.pull, Some(0.0));
        assert_relative_eq!(t.constraint.unwrap(), 0.9, epsilon = 1e-12);
        if let ShiftOutcome::Shifted { mu, .. } = t.prefit_up {
            assert_relative_eq!(mu, 1.05, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_postfit_down_uses_signed_error() {
        let engine = MockEngine::new();
        let report = rank_impacts(&engine, &ImpactConfig::default()).unwrap();
        let jes = &report.impacts[1];
        // alpha_jes1: 0.2 + (-0.7) = -0.5, slope -0.1 → mu shift +0.07
        assert_relative_eq!(delta(&jes.postfit_down), 0.07, epsilon = 1e-12);
        assert_relative_eq!(delta(&jes.postfit_up), -0.08, epsilon = 1e-12);

        let seen = engine.seen.lock().unwrap();
        let down = seen
            .iter()
            .find(|s| s.get("alpha_jes1").is_some_and(|p| p.constant && p.value < 0.0 && p.value > -0.6))
            .expect("post-fit down refit of alpha_jes1");
        assert_relative_eq!(down.get("alpha_jes1").unwrap().value, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_refit_state_isolation() {
        let engine = MockEngine::new();
        let config = ImpactConfig::default();
        let eligible = config.filter.select(&engine.nuisance_names(), "mu");
        let nominal = nominal_fit(&engine, &config, &eligible).unwrap();
        engine.seen.lock().unwrap().clear();

        evaluate_np(&engine, &nominal, "alpha_test", &config).unwrap();

        let nominal_state = nominal.snapshot.state();
        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        for s in seen.iter() {
            for (got, want) in s.parameters().iter().zip(nominal_state.parameters()) {
                if got.name == "alpha_test" {
                    assert!(got.constant);
                } else {
                    assert_eq!(got, want, "refit input differs from nominal for {}", got.name);
                }
            }
        }
        // The snapshot itself never changes.
        assert!(!nominal.snapshot.get("alpha_test").unwrap().constant);
        assert_eq!(nominal.snapshot.label(), NOMINAL_SNAPSHOT);
    }

    #[test]
    fn test_nominal_fit_idempotent() {
        let engine = MockEngine::new();
        let config = ImpactConfig::default();
        let a = nominal_fit(&engine, &config, &[]).unwrap();
        let b = nominal_fit(&engine, &config, &[]).unwrap();
        assert_eq!((a.mu_hat, a.err_hi, a.err_lo), (b.mu_hat, b.err_hi, b.err_lo));
        assert_eq!(a.snapshot.state(), b.snapshot.state());
    }

    #[test]
    fn test_zero_matches_gives_empty_report() {
        let engine = MockEngine::new();
        let config = ImpactConfig { filter: NuisanceFilter::new("gamma_"), ..Default::default() };
        let report = rank_impacts(&engine, &config).unwrap();
        assert!(report.impacts.is_empty());
        assert_eq!(report.filter, "gamma_");
        assert_relative_eq!(report.mu_hat, 1.0);
    }

    #[test]
    fn test_failed_refit_is_isolated() {
        let engine = MockEngine { broken: Some("alpha_jes1"), ..MockEngine::new() };
        let report = rank_impacts(&engine, &ImpactConfig::default()).unwrap();

        assert_eq!(report.impacts.len(), 2);
        assert_eq!(report.impacts[0].n_unavailable(), 0);
        assert_eq!(report.impacts[1].n_unavailable(), 4);
        assert_eq!(report.n_unavailable, 4);
        assert!(matches!(
            &report.impacts[1].prefit_up,
            ShiftOutcome::Unavailable { reason } if reason.contains("converge")
        ));

        let lenient = ImpactConfig { accept_unconverged: true, ..Default::default() };
        let report = rank_impacts(&engine, &lenient).unwrap();
        assert_eq!(report.n_unavailable, 0);
    }

    #[test]
    fn test_unconverged_nominal_aborts() {
        let engine = MockEngine { nominal_converges: false, ..MockEngine::new() };
        let err = rank_impacts(&engine, &ImpactConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Convergence(_)));

        let lenient = ImpactConfig { accept_unconverged: true, ..Default::default() };
        let report = rank_impacts(&engine, &lenient).unwrap();
        assert!(!report.nominal_converged);
        assert_eq!(report.impacts.len(), 2);
    }

    #[test]
    fn test_fixed_np_is_not_eligible() {
        let engine = MockEngine { fixed: vec![false, false, true, false], ..MockEngine::new() };
        let report = rank_impacts(&engine, &ImpactConfig::default()).unwrap();
        let names: Vec<&str> = report.impacts.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha_test"]);
    }

    #[test]
    fn test_impact_order_and_prefit_step() {
        let engine = MockEngine::new();
        let config = ImpactConfig { order: ImpactOrder::Impact, prefit_step: 2.0, ..Default::default() };
        let report = rank_impacts(&engine, &config).unwrap();
        // |slope| 0.1 beats 0.05
        assert_eq!(report.impacts[0].name, "alpha_jes1");
        assert_relative_eq!(delta(&report.impacts[1].prefit_up), 0.10, epsilon = 1e-12);
        assert_eq!("impact".parse::<ImpactOrder>().unwrap(), ImpactOrder::Impact);
        assert!("size".parse::<ImpactOrder>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_variation_targets_clamp_to_bounds() {
        let p = ParameterValue {
            name: "alpha_edge".into(),
            value: 4.5,
            constant: false,
            bounds: (-5.0, 5.0),
            error_hi: Some(0.8),
            error_lo: None,
        };
        assert_eq!(Variation::PrefitUp.target(&p, 1.0).unwrap(), 5.0);
        assert_eq!(Variation::PrefitDown.target(&p, 1.0).unwrap(), 3.5);
        assert_eq!(Variation::PostfitUp.target(&p, 1.0).unwrap(), 5.0);
        assert!(Variation::PostfitDown.target(&p, 1.0).is_err());
    }

    #[test]
    fn test_shift_json_shape() {
        let ok = serde_json::to_value(ShiftOutcome::Shifted { mu: 1.05, delta: 0.05 }).unwrap();
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["delta"], 0.05);
        let na = serde_json::to_value(ShiftOutcome::Unavailable { reason: "x".into() }).unwrap();
        assert_eq!(na["status"], "unavailable");
        assert_eq!(na["reason"], "x");
    }
}
