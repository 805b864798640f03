//! Simple workspace builders for tests, benches and tutorials.
//!
//! In the spirit of `pyhf.simplemodels`: construct a [`Workspace`] from
//! minimal inputs, with systematics named after the HistFactory `alpha_`
//! convention.

use super::schema::{
    Channel, Measurement, MeasurementConfig, Modifier, NormSysData, Observation, Sample, Workspace,
};

/// One log-normal background normalization systematic.
#[derive(Debug, Clone)]
pub struct NormSystematic {
    /// Parameter name, e.g. `alpha_jes`
    pub name: String,
    /// Up factor
    pub hi: f64,
    /// Down factor
    pub lo: f64,
}

impl NormSystematic {
    /// Symmetric `1 ± rel` systematic.
    pub fn symmetric(name: &str, rel: f64) -> Self {
        Self { name: name.to_string(), hi: 1.0 + rel, lo: 1.0 - rel }
    }
}

/// Single-channel signal + background workspace.
///
/// The signal is scaled by the POI `mu`; the background carries one `normsys`
/// per systematic plus an optional free normalization factor `mu_bkg`
/// (which is a nuisance parameter in the statistical sense but has no
/// `alpha_` marker).
///
/// # Panics
/// Panics if the slices have different lengths or are empty.
pub fn signal_background(
    signal: &[f64],
    bkg: &[f64],
    observed: &[f64],
    systematics: &[NormSystematic],
    free_bkg_norm: bool,
) -> Workspace {
    assert!(!signal.is_empty(), "signal must not be empty");
    assert_eq!(signal.len(), bkg.len(), "signal and bkg must have the same length");
    assert_eq!(signal.len(), observed.len(), "signal and observed must have the same length");

    let mut bkg_modifiers: Vec<Modifier> = systematics
        .iter()
        .map(|s| Modifier::NormSys {
            name: s.name.clone(),
            data: NormSysData { hi: s.hi, lo: s.lo },
        })
        .collect();
    if free_bkg_norm {
        bkg_modifiers.push(Modifier::NormFactor { name: "mu_bkg".to_string(), data: None });
    }

    Workspace {
        channels: vec![Channel {
            name: "SR".to_string(),
            samples: vec![
                Sample {
                    name: "signal".to_string(),
                    data: signal.to_vec(),
                    modifiers: vec![Modifier::NormFactor { name: "mu".to_string(), data: None }],
                },
                Sample { name: "background".to_string(), data: bkg.to_vec(), modifiers: bkg_modifiers },
            ],
        }],
        observations: vec![Observation { name: "SR".to_string(), data: observed.to_vec() }],
        measurements: vec![Measurement {
            name: "NormalMeasurement".to_string(),
            config: MeasurementConfig { poi: "mu".to_string(), parameters: vec![] },
        }],
        datasets: vec![],
        version: Some("1.0.0".to_string()),
    }
}
