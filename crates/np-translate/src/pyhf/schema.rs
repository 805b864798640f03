//! pyhf JSON schema types

use serde::{Deserialize, Serialize};

/// Name under which a workspace's own `observations` are exposed as a dataset.
pub const PRIMARY_DATASET: &str = "obsData";

/// pyhf workspace representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Channels
    pub channels: Vec<Channel>,
    /// Observations (the primary dataset, `obsData`)
    pub observations: Vec<Observation>,
    /// Measurements
    pub measurements: Vec<Measurement>,
    /// Additional named datasets.
    ///
    /// Non-standard extension, ignored by pyhf.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<Dataset>,
    /// Schema version
    #[serde(default)]
    pub version: Option<String>,
}

impl Workspace {
    /// Find a measurement by name.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name == name)
    }

    /// Observations of a named dataset. `obsData` resolves to `observations`.
    pub fn dataset(&self, name: &str) -> Option<&[Observation]> {
        if name == PRIMARY_DATASET {
            return Some(&self.observations);
        }
        self.datasets.iter().find(|d| d.name == name).map(|d| d.observations.as_slice())
    }

    /// Names of every dataset, primary first.
    pub fn dataset_names(&self) -> Vec<&str> {
        std::iter::once(PRIMARY_DATASET).chain(self.datasets.iter().map(|d| d.name.as_str())).collect()
    }

    /// `true` if any modifier in any sample is named `name`.
    pub fn has_modifier(&self, name: &str) -> bool {
        self.channels
            .iter()
            .flat_map(|c| &c.samples)
            .flat_map(|s| &s.modifiers)
            .any(|m| m.name() == name)
    }
}

/// Channel (region)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name
    pub name: String,
    /// Samples in this channel
    pub samples: Vec<Sample>,
}

/// Sample (process)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Sample name
    pub name: String,
    /// Expected event counts per bin
    pub data: Vec<f64>,
    /// Modifiers (systematics)
    pub modifiers: Vec<Modifier>,
}

/// Modifier (systematic uncertainty)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Modifier {
    /// normfactor: free-floating normalization (e.g., POI)
    #[serde(rename = "normfactor")]
    NormFactor {
        /// Modifier name.
        name: String,
        /// Optional modifier payload (unused).
        #[serde(default)]
        data: Option<serde_json::Value>,
    },

    /// normsys: log-normal normalization uncertainty
    #[serde(rename = "normsys")]
    NormSys {
        /// Modifier name.
        name: String,
        /// Log-normal parameters.
        data: NormSysData,
    },

    /// histosys: histogram-based shape uncertainty
    #[serde(rename = "histosys")]
    HistoSys {
        /// Modifier name.
        name: String,
        /// Up/down templates.
        data: HistoSysData,
    },

    /// shapesys: bin-by-bin uncertainty with Barlow–Beeston Poisson constraints
    #[serde(rename = "shapesys")]
    ShapeSys {
        /// Modifier name.
        name: String,
        /// Per-bin absolute uncertainties (σ).
        data: Vec<f64>,
    },

    /// shapefactor: unconstrained shape variation
    #[serde(rename = "shapefactor")]
    ShapeFactor {
        /// Modifier name.
        name: String,
        /// Optional modifier payload (unused).
        #[serde(default)]
        data: Option<serde_json::Value>,
    },

    /// staterror: MC statistical error, Gaussian-constrained per bin
    #[serde(rename = "staterror")]
    StatError {
        /// Modifier name.
        name: String,
        /// Per-bin absolute uncertainties (σ).
        data: Vec<f64>,
    },

    /// lumi: luminosity uncertainty
    #[serde(rename = "lumi")]
    Lumi {
        /// Modifier name.
        name: String,
        /// Optional modifier payload (unused).
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
}

impl Modifier {
    /// Modifier name (parameter name, or parameter base name for per-bin modifiers).
    pub fn name(&self) -> &str {
        match self {
            Modifier::NormFactor { name, .. }
            | Modifier::NormSys { name, .. }
            | Modifier::HistoSys { name, .. }
            | Modifier::ShapeSys { name, .. }
            | Modifier::ShapeFactor { name, .. }
            | Modifier::StatError { name, .. }
            | Modifier::Lumi { name, .. } => name,
        }
    }
}

/// normsys data (hi/lo factors)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormSysData {
    /// High (up) multiplicative factor.
    pub hi: f64,
    /// Low (down) multiplicative factor.
    pub lo: f64,
}

/// histosys data (up/down histograms)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoSysData {
    /// High (up) template values.
    pub hi_data: Vec<f64>,
    /// Low (down) template values.
    pub lo_data: Vec<f64>,
}

/// Observation (data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Channel name this observation belongs to
    pub name: String,
    /// Observed event counts per bin
    pub data: Vec<f64>,
}

/// Named set of per-channel observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name
    pub name: String,
    /// Observations, one per channel
    pub observations: Vec<Observation>,
}

/// Measurement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Measurement name
    pub name: String,
    /// Configuration
    pub config: MeasurementConfig,
}

/// Measurement config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Parameter of interest
    pub poi: String,
    /// Parameter configurations
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

/// Parameter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Parameter name
    pub name: String,
    /// Initial values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inits: Vec<f64>,
    /// Bounds [[min, max]]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounds: Vec<[f64; 2]>,
    /// Whether this parameter is fixed (constant) in fits.
    #[serde(default)]
    pub fixed: bool,
    /// Auxiliary data (constraint centers)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxdata: Vec<f64>,
    /// Constraint widths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sigmas: Vec<f64>,
}
