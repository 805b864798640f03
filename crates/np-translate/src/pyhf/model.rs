//! HistFactory Model representation
//!
//! Converts a pyhf Workspace into an internal model suitable for inference.

use super::schema::*;
use np_core::traits::{LogDensityModel, PoiModel};
use np_core::{Error, Result};
use statrs::function::gamma::ln_gamma;
use std::collections::HashMap;

/// HistFactory model
#[derive(Debug, Clone)]
pub struct HistFactoryModel {
    /// Model parameters
    parameters: Vec<Parameter>,
    /// Parameter of interest index
    poi_index: Option<usize>,
    /// Channels
    channels: Vec<ModelChannel>,
}

/// Model parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Initial value
    pub init: f64,
    /// Bounds (min, max)
    pub bounds: (f64, f64),
    /// Held constant by the measurement config
    pub fixed: bool,
    /// Is this a nuisance parameter with a Gaussian constraint?
    pub constrained: bool,
    /// Constraint center (for constrained NP)
    pub constraint_center: Option<f64>,
    /// Constraint width (for constrained NP)
    pub constraint_width: Option<f64>,
}

#[derive(Debug, Clone)]
struct ModelChannel {
    name: String,
    samples: Vec<ModelSample>,
    /// Observed data (main bins only)
    observed: Vec<f64>,
    /// Barlow-Beeston auxiliary constraints, one per shapesys modifier
    auxiliary_data: Vec<AuxiliaryPoissonConstraint>,
}

#[derive(Debug, Clone)]
struct AuxiliaryPoissonConstraint {
    /// Gamma parameter per bin
    param_indices: Vec<usize>,
    /// `tau_i = (nominal_i / sigma_i)^2`; also the observed aux count
    tau: Vec<f64>,
}

#[derive(Debug, Clone)]
struct ModelSample {
    #[allow(dead_code)]
    name: String,
    nominal: Vec<f64>,
    modifiers: Vec<ModelModifier>,
}

#[derive(Debug, Clone)]
enum ModelModifier {
    /// Normalization factor (unconstrained)
    NormFactor { param_idx: usize },
    /// Per-bin multiplicative gammas (normfactor-like per bin)
    PerBin { param_indices: Vec<usize> },
    /// Normalization systematic, code4 interpolation
    NormSys { param_idx: usize, hi_factor: f64, lo_factor: f64 },
    /// Histogram systematic, code4p interpolation
    HistoSys { param_idx: usize, hi_template: Vec<f64>, lo_template: Vec<f64> },
    /// Luminosity normalization
    Lumi { param_idx: usize },
}

const POS_LO: f64 = 1e-10;
const POS_HI: f64 = 10.0;
const ALPHA_BOUNDS: (f64, f64) = (-5.0, 5.0);

/// Registry that assigns parameter indices in first-seen order.
#[derive(Default)]
struct ParameterRegistry {
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParameterRegistry {
    fn add(&mut self, param: Parameter) -> usize {
        if let Some(&idx) = self.index.get(&param.name) {
            return idx;
        }
        let idx = self.parameters.len();
        self.index.insert(param.name.clone(), idx);
        self.parameters.push(param);
        idx
    }

    fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

fn free(name: String, init: f64, bounds: (f64, f64)) -> Parameter {
    Parameter {
        name,
        init,
        bounds,
        fixed: false,
        constrained: false,
        constraint_center: None,
        constraint_width: None,
    }
}

fn gaussian(name: String, init: f64, bounds: (f64, f64), center: f64, width: f64) -> Parameter {
    Parameter {
        name,
        init,
        bounds,
        fixed: false,
        constrained: true,
        constraint_center: Some(center),
        constraint_width: Some(width),
    }
}

fn bin_name(name: &str, bin_idx: usize) -> String {
    format!("{}[{}]", name, bin_idx)
}

/// Pick element `idx` of a measurement override list (scalar lists broadcast).
fn pick<T: Copy>(values: &[T], idx: usize) -> Option<T> {
    if values.len() == 1 { values.first().copied() } else { values.get(idx).copied() }
}

/// Parameters a modifier introduces, with their default init, bounds and
/// constraint. Per-bin modifiers yield one parameter per bin.
fn modifier_parameters(modifier: &Modifier, n_sample_bins: usize) -> Vec<Parameter> {
    match modifier {
        Modifier::NormFactor { name, .. } => vec![free(name.clone(), 1.0, (0.0, POS_HI))],
        Modifier::NormSys { name, .. } | Modifier::HistoSys { name, .. } => {
            vec![gaussian(name.clone(), 0.0, ALPHA_BOUNDS, 0.0, 1.0)]
        }
        Modifier::Lumi { name, .. } => vec![gaussian(name.clone(), 1.0, (0.0, POS_HI), 1.0, 0.02)],
        // Poisson-constrained in `nll`, not Gaussian.
        Modifier::ShapeSys { name, data } => (0..data.len())
            .map(|b| free(bin_name(name, b), 1.0, (POS_LO, POS_HI)))
            .collect(),
        Modifier::ShapeFactor { name, .. } => {
            (0..n_sample_bins).map(|b| free(bin_name(name, b), 1.0, (0.0, POS_HI))).collect()
        }
        // Width is set once all samples sharing the modifier are known.
        Modifier::StatError { name, data } => (0..data.len())
            .map(|b| gaussian(bin_name(name, b), 1.0, (POS_LO, POS_HI), 1.0, 1.0))
            .collect(),
    }
}

impl HistFactoryModel {
    fn validate_params_len(&self, got: usize) -> Result<()> {
        let expected = self.parameters.len();
        if got != expected {
            return Err(Error::Validation(format!(
                "Parameter length mismatch: expected {}, got {}",
                expected, got
            )));
        }
        Ok(())
    }

    /// Create model from a pyhf workspace, using its first measurement and
    /// its primary observations.
    pub fn from_workspace(ws: &Workspace) -> Result<Self> {
        let measurement = ws.measurements.first().ok_or_else(|| {
            Error::Configuration("Workspace has no measurements".to_string())
        })?;
        Self::from_parts(ws, measurement, &ws.observations)
    }

    /// Create model from explicit measurement and dataset selections.
    pub fn from_parts(
        ws: &Workspace,
        measurement: &Measurement,
        observations: &[Observation],
    ) -> Result<Self> {
        let poi_name = measurement.config.poi.as_str();
        if !ws.has_modifier(poi_name) {
            return Err(Error::Configuration(format!(
                "POI '{}' of measurement '{}' is not a parameter of the workspace",
                poi_name, measurement.name
            )));
        }

        // The POI keeps the parameter its modifier defines; registering it
        // first only puts it at the front of the parameter order.
        let mut registry = ParameterRegistry::default();
        let poi_modifiers = ws
            .channels
            .iter()
            .flat_map(|c| &c.samples)
            .flat_map(|s| s.modifiers.iter().map(move |m| (m, s.data.len())))
            .filter(|(m, _)| m.name() == poi_name);
        for (modifier, n_bins) in poi_modifiers {
            for param in modifier_parameters(modifier, n_bins) {
                registry.add(param);
            }
        }
        let poi_index = registry.get(poi_name).ok_or_else(|| {
            Error::Configuration(format!(
                "POI '{}' of measurement '{}' is a per-bin modifier, not a single parameter",
                poi_name, measurement.name
            ))
        })?;

        // staterror sigmas are relative to the summed nominal of all samples sharing the modifier
        let mut staterror_accum: HashMap<String, (Vec<f64>, Vec<f64>)> = HashMap::new();

        for channel in &ws.channels {
            for sample in &channel.samples {
                for modifier in &sample.modifiers {
                    for param in modifier_parameters(modifier, sample.data.len()) {
                        registry.add(param);
                    }
                    let Modifier::StatError { name, data } = modifier else { continue };
                    let (sum_nominal, sum_sq) = staterror_accum
                        .entry(name.clone())
                        .or_insert_with(|| (vec![0.0; data.len()], vec![0.0; data.len()]));
                    if sum_nominal.len() != data.len() {
                        return Err(Error::Validation(format!(
                            "StatError modifier '{}' bin length mismatch: {} != {}",
                            name,
                            sum_nominal.len(),
                            data.len()
                        )));
                    }
                    for (bin_idx, (sigma, nominal)) in data.iter().zip(&sample.data).enumerate() {
                        sum_nominal[bin_idx] += nominal;
                        sum_sq[bin_idx] += sigma * sigma;
                    }
                }
            }
        }

        let ParameterRegistry { mut parameters, index } = registry;

        for (name, (sum_nominal, sum_sq)) in staterror_accum {
            for (bin_idx, (nominal, sq)) in sum_nominal.iter().zip(&sum_sq).enumerate() {
                let Some(&pidx) = index.get(&bin_name(&name, bin_idx)) else { continue };
                let sigma_rel = if *nominal > 0.0 { sq.sqrt() / nominal } else { 0.0 };
                let p = &mut parameters[pidx];
                if sigma_rel > 0.0 {
                    p.constraint_width = Some(sigma_rel);
                } else {
                    // Zero uncertainty: the gamma has nothing to constrain it and stays at 1.
                    p.constrained = false;
                    p.constraint_center = None;
                    p.constraint_width = None;
                    p.fixed = true;
                }
            }
        }

        Self::apply_measurement_overrides(&mut parameters, measurement);

        let registry = ParameterRegistry { parameters, index };
        let mut channels = Vec::with_capacity(ws.channels.len());
        for ws_channel in &ws.channels {
            channels.push(Self::build_channel(ws_channel, observations, &registry)?);
        }
        // pyhf orders channels lexicographically
        channels.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { parameters: registry.parameters, poi_index: Some(poi_index), channels })
    }

    fn apply_measurement_overrides(parameters: &mut [Parameter], measurement: &Measurement) {
        for cfg in &measurement.config.parameters {
            for param in parameters.iter_mut() {
                // Match scalar name or vector-like "<base>[<i>]" names.
                let elem_idx = if param.name == cfg.name {
                    Some(0usize)
                } else {
                    param
                        .name
                        .strip_prefix(&cfg.name)
                        .and_then(|rest| rest.strip_prefix('['))
                        .and_then(|s| s.strip_suffix(']'))
                        .and_then(|s| s.parse::<usize>().ok())
                };
                let Some(elem_idx) = elem_idx else { continue };

                if let Some(init) = pick(&cfg.inits, elem_idx) {
                    param.init = init;
                }
                if let Some([lo, hi]) = pick(&cfg.bounds, elem_idx) {
                    param.bounds = (lo, hi);
                }
                if let (Some(center), Some(width)) =
                    (pick(&cfg.auxdata, elem_idx), pick(&cfg.sigmas, elem_idx))
                {
                    param.constrained = true;
                    param.constraint_center = Some(center);
                    param.constraint_width = Some(width);
                }
                if cfg.fixed {
                    param.fixed = true;
                }
            }
        }
    }

    fn build_channel(
        ws_channel: &Channel,
        observations: &[Observation],
        registry: &ParameterRegistry,
    ) -> Result<ModelChannel> {
        let observed = observations
            .iter()
            .find(|o| o.name == ws_channel.name)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "Dataset missing observations for channel '{}'",
                    ws_channel.name
                ))
            })?
            .data
            .clone();

        let n_bins = ws_channel.samples.first().map(|s| s.data.len()).unwrap_or(0);
        if n_bins == 0 {
            return Err(Error::Validation(format!(
                "Channel '{}' has no bins (empty sample data)",
                ws_channel.name
            )));
        }
        if observed.len() != n_bins {
            return Err(Error::Validation(format!(
                "Channel '{}' observations length mismatch: expected {}, got {}",
                ws_channel.name,
                n_bins,
                observed.len()
            )));
        }

        let lookup = |name: &str| {
            registry.get(name).ok_or_else(|| {
                Error::Computation(format!("Parameter '{}' was not registered", name))
            })
        };
        let check_len = |what: &str, sample: &str, got: usize| {
            if got != n_bins {
                return Err(Error::Validation(format!(
                    "Channel '{}' sample '{}' {} length mismatch: expected {}, got {}",
                    ws_channel.name, sample, what, n_bins, got
                )));
            }
            Ok(())
        };

        let mut samples = Vec::with_capacity(ws_channel.samples.len());
        let mut auxiliary_data = Vec::new();

        for ws_sample in &ws_channel.samples {
            check_len("bin", &ws_sample.name, ws_sample.data.len())?;

            let mut modifiers = Vec::with_capacity(ws_sample.modifiers.len());
            for ws_modifier in &ws_sample.modifiers {
                let modifier = match ws_modifier {
                    Modifier::NormFactor { name, .. } => {
                        ModelModifier::NormFactor { param_idx: lookup(name)? }
                    }
                    Modifier::Lumi { name, .. } => ModelModifier::Lumi { param_idx: lookup(name)? },
                    Modifier::NormSys { name, data } => ModelModifier::NormSys {
                        param_idx: lookup(name)?,
                        hi_factor: data.hi,
                        lo_factor: data.lo,
                    },
                    Modifier::HistoSys { name, data } => {
                        check_len("HistoSys hi_data", &ws_sample.name, data.hi_data.len())?;
                        check_len("HistoSys lo_data", &ws_sample.name, data.lo_data.len())?;
                        ModelModifier::HistoSys {
                            param_idx: lookup(name)?,
                            hi_template: data.hi_data.clone(),
                            lo_template: data.lo_data.clone(),
                        }
                    }
                    Modifier::ShapeSys { name, data } => {
                        check_len("ShapeSys", &ws_sample.name, data.len())?;
                        let param_indices = (0..n_bins)
                            .map(|b| lookup(&bin_name(name, b)))
                            .collect::<Result<Vec<_>>>()?;
                        let tau = data
                            .iter()
                            .zip(&ws_sample.data)
                            .map(|(sigma, nominal)| {
                                if *sigma > 0.0 && *nominal > 0.0 {
                                    (nominal / sigma).powi(2)
                                } else {
                                    1.0
                                }
                            })
                            .collect();
                        auxiliary_data.push(AuxiliaryPoissonConstraint {
                            param_indices: param_indices.clone(),
                            tau,
                        });
                        ModelModifier::PerBin { param_indices }
                    }
                    Modifier::StatError { name, data } => {
                        check_len("StatError", &ws_sample.name, data.len())?;
                        let param_indices = (0..n_bins)
                            .map(|b| lookup(&bin_name(name, b)))
                            .collect::<Result<Vec<_>>>()?;
                        ModelModifier::PerBin { param_indices }
                    }
                    Modifier::ShapeFactor { name, .. } => {
                        let param_indices = (0..n_bins)
                            .map(|b| lookup(&bin_name(name, b)))
                            .collect::<Result<Vec<_>>>()?;
                        ModelModifier::PerBin { param_indices }
                    }
                };
                modifiers.push(modifier);
            }

            samples.push(ModelSample {
                name: ws_sample.name.clone(),
                nominal: ws_sample.data.clone(),
                modifiers,
            });
        }

        Ok(ModelChannel { name: ws_channel.name.clone(), samples, observed, auxiliary_data })
    }

    /// Number of parameters
    pub fn n_params(&self) -> usize {
        self.parameters.len()
    }

    /// Get POI index
    pub fn poi_index(&self) -> Option<usize> {
        self.poi_index
    }

    /// Get parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Nuisance parameters: every parameter except the POI and those fixed
    /// by the measurement config.
    pub fn nuisance_indices(&self) -> Vec<usize> {
        self.parameters
            .iter()
            .enumerate()
            .filter(|(i, p)| Some(*i) != self.poi_index && !p.fixed)
            .map(|(i, _)| i)
            .collect()
    }

    /// Channel names in model (lexicographic) order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// Expected main-bin yields, channels concatenated in model order.
    pub fn expected_data(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.validate_params_len(params.len())?;
        let mut result = Vec::new();

        for channel in &self.channels {
            let n_bins = channel.observed.len();
            let mut channel_expected = vec![0.0; n_bins];

            for sample in &channel.samples {
                // pyhf combination: expected = (nominal + sum(deltas)) * product(factors)
                let mut deltas = vec![0.0; n_bins];
                let mut factors = vec![1.0; n_bins];

                for modifier in &sample.modifiers {
                    match modifier {
                        ModelModifier::NormFactor { param_idx } | ModelModifier::Lumi { param_idx } => {
                            let norm = params[*param_idx];
                            factors.iter_mut().for_each(|f| *f *= norm);
                        }
                        ModelModifier::PerBin { param_indices } => {
                            for (fac, &idx) in factors.iter_mut().zip(param_indices) {
                                *fac *= params[idx];
                            }
                        }
                        ModelModifier::NormSys { param_idx, hi_factor, lo_factor } => {
                            let factor = normsys_code4(params[*param_idx], *hi_factor, *lo_factor);
                            factors.iter_mut().for_each(|f| *f *= factor);
                        }
                        ModelModifier::HistoSys { param_idx, hi_template, lo_template } => {
                            let alpha = params[*param_idx];
                            for (bin_idx, delta) in deltas.iter_mut().enumerate() {
                                let nom = sample.nominal[bin_idx];
                                *delta += histosys_code4p_delta(
                                    alpha,
                                    lo_template[bin_idx],
                                    nom,
                                    hi_template[bin_idx],
                                );
                            }
                        }
                    }
                }

                for (bin_idx, value) in channel_expected.iter_mut().enumerate() {
                    *value += (sample.nominal[bin_idx] + deltas[bin_idx]) * factors[bin_idx];
                }
            }

            result.extend(channel_expected);
        }

        Ok(result)
    }

    /// Negative log-likelihood: Poisson main bins, Barlow–Beeston auxiliary
    /// Poisson terms, and Gaussian constraints.
    pub fn nll(&self, params: &[f64]) -> Result<f64> {
        let expected = self.expected_data(params)?;
        let mut nll = 0.0;

        let mut offset = 0;
        for channel in &self.channels {
            for (i, &obs) in channel.observed.iter().enumerate() {
                let exp = expected[offset + i].max(1e-10);
                nll += poisson_nll(obs, exp);
            }
            offset += channel.observed.len();

            for constraint in &channel.auxiliary_data {
                for (&tau, &gamma_idx) in constraint.tau.iter().zip(&constraint.param_indices) {
                    let exp_aux = (params[gamma_idx] * tau).max(1e-10);
                    nll += poisson_nll(tau, exp_aux);
                }
            }
        }

        for (param, &value) in self.parameters.iter().zip(params) {
            if !param.constrained {
                continue;
            }
            if let (Some(center), Some(width)) = (param.constraint_center, param.constraint_width)
                && width > 0.0
            {
                let pull = (value - center) / width;
                nll += 0.5 * pull * pull + width.ln() + 0.5 * (2.0 * std::f64::consts::PI).ln();
            }
        }

        if !nll.is_finite() {
            return Err(Error::Computation(format!("Non-finite NLL: {}", nll)));
        }
        Ok(nll)
    }

    /// Gradient of NLL using central finite differences.
    pub fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        use rayon::prelude::*;

        self.validate_params_len(params.len())?;
        (0..params.len())
            .into_par_iter()
            .map(|i| {
                let (lo, hi) = self.parameters[i].bounds;
                let eps = 1e-6 * params[i].abs().max(1.0);
                let x_plus = (params[i] + eps).min(hi.max(params[i]));
                let x_minus = (params[i] - eps).max(lo.min(params[i]));
                let span = x_plus - x_minus;
                if span <= 0.0 {
                    return Ok(0.0);
                }
                let mut p = params.to_vec();
                p[i] = x_plus;
                let f_plus = self.nll(&p)?;
                p[i] = x_minus;
                let f_minus = self.nll(&p)?;
                Ok((f_plus - f_minus) / span)
            })
            .collect()
    }
}

fn poisson_nll(obs: f64, exp: f64) -> f64 {
    if obs > 0.0 { exp - obs * exp.ln() + ln_gamma(obs + 1.0) } else { exp }
}

impl LogDensityModel for HistFactoryModel {
    fn dim(&self) -> usize {
        self.n_params()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.bounds).collect()
    }

    fn parameter_init(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.init).collect()
    }

    fn parameter_fixed(&self) -> Vec<bool> {
        self.parameters.iter().map(|p| p.fixed).collect()
    }

    fn parameter_priors(&self) -> Vec<Option<(f64, f64)>> {
        self.parameters
            .iter()
            .map(|p| match (p.constrained, p.constraint_center, p.constraint_width) {
                (true, Some(c), Some(w)) => Some((c, w)),
                _ => None,
            })
            .collect()
    }

    fn nll(&self, params: &[f64]) -> Result<f64> {
        HistFactoryModel::nll(self, params)
    }

    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        HistFactoryModel::gradient(self, params)
    }
}

impl PoiModel for HistFactoryModel {
    fn poi_index(&self) -> Option<usize> {
        HistFactoryModel::poi_index(self)
    }
}

fn normsys_code4_coeffs(hi: f64, lo: f64) -> [f64; 6] {
    // pyhf.interpolators.code4 with alpha0=1
    const A_INV: [[f64; 6]; 6] = [
        [15.0 / 16.0, -15.0 / 16.0, -7.0 / 16.0, -7.0 / 16.0, 1.0 / 16.0, -1.0 / 16.0],
        [3.0 / 2.0, 3.0 / 2.0, -9.0 / 16.0, 9.0 / 16.0, 1.0 / 16.0, 1.0 / 16.0],
        [-5.0 / 8.0, 5.0 / 8.0, 5.0 / 8.0, 5.0 / 8.0, -1.0 / 8.0, 1.0 / 8.0],
        [-3.0 / 2.0, -3.0 / 2.0, 7.0 / 8.0, -7.0 / 8.0, -1.0 / 8.0, -1.0 / 8.0],
        [3.0 / 16.0, -3.0 / 16.0, -3.0 / 16.0, -3.0 / 16.0, 1.0 / 16.0, -1.0 / 16.0],
        [1.0 / 2.0, 1.0 / 2.0, -5.0 / 16.0, 5.0 / 16.0, 1.0 / 16.0, 1.0 / 16.0],
    ];

    let (ln_hi, ln_lo) = (hi.ln(), lo.ln());
    let b = [
        hi - 1.0,
        lo - 1.0,
        hi * ln_hi,
        -lo * ln_lo,
        hi * ln_hi.powi(2),
        lo * ln_lo.powi(2),
    ];

    let mut a = [0.0; 6];
    for (r, row) in A_INV.iter().enumerate() {
        a[r] = row.iter().zip(&b).map(|(x, y)| x * y).sum();
    }
    a
}

/// normsys `code4` (alpha0 = 1): exponential outside `|alpha| < 1`,
/// 6th-order polynomial inside.
fn normsys_code4(alpha: f64, hi: f64, lo: f64) -> f64 {
    if hi <= 0.0 || lo <= 0.0 {
        return if alpha >= 0.0 { 1.0 + alpha * (hi - 1.0) } else { 1.0 - alpha * (1.0 - lo) };
    }
    if alpha.abs() >= 1.0 {
        let base = if alpha >= 0.0 { hi } else { lo };
        return (alpha.abs() * base.ln()).exp();
    }
    let c = normsys_code4_coeffs(hi, lo);
    let mut value = 1.0;
    let mut power = 1.0;
    for coeff in c {
        power *= alpha;
        value += coeff * power;
    }
    value
}

/// histosys `code4p` delta term (added to nominal).
fn histosys_code4p_delta(alpha: f64, down: f64, nom: f64, up: f64) -> f64 {
    let delta_up = up - nom;
    let delta_dn = nom - down;

    if alpha > 1.0 {
        return delta_up * alpha;
    }
    if alpha < -1.0 {
        return delta_dn * alpha;
    }

    let s = 0.5 * (delta_up + delta_dn);
    let a = 0.0625 * (delta_up - delta_dn);
    let asq = alpha * alpha;
    alpha * s + asq * (asq * (3.0 * asq - 10.0) + 15.0) * a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normsys_code4_matches_endpoints() {
        assert_relative_eq!(normsys_code4(0.0, 1.1, 0.9), 1.0, epsilon = 1e-12);
        assert_relative_eq!(normsys_code4(1.0, 1.1, 0.9), 1.1, epsilon = 1e-12);
        assert_relative_eq!(normsys_code4(-1.0, 1.1, 0.9), 0.9, epsilon = 1e-12);
        assert_relative_eq!(normsys_code4(2.0, 1.1, 0.9), 1.21, epsilon = 1e-12);
        // Polynomial region joins continuously.
        assert_relative_eq!(normsys_code4(0.999_999, 1.1, 0.9), 1.1, epsilon = 1e-6);
    }

    #[test]
    fn test_histosys_code4p_endpoints() {
        assert_relative_eq!(histosys_code4p_delta(0.0, 8.0, 10.0, 13.0), 0.0);
        assert_relative_eq!(histosys_code4p_delta(1.0, 8.0, 10.0, 13.0), 3.0, epsilon = 1e-12);
        assert_relative_eq!(histosys_code4p_delta(-1.0, 8.0, 10.0, 13.0), -2.0, epsilon = 1e-12);
        assert_relative_eq!(histosys_code4p_delta(2.0, 8.0, 10.0, 13.0), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_poisson_nll_zero_obs() {
        assert_relative_eq!(poisson_nll(0.0, 2.5), 2.5);
        // n=1, lambda=1: 1 - 0 + ln(1) = 1
        assert_relative_eq!(poisson_nll(1.0, 1.0), 1.0, epsilon = 1e-12);
    }
}
