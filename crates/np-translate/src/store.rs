//! File-backed model store.
//!
//! A store file is either a bare pyhf workspace, registered under
//! [`DEFAULT_WORKSPACE`], or an object holding several named workspaces:
//!
//! ```json
//! { "workspaces": { "combined": { "channels": [], "observations": [], "measurements": [] } } }
//! ```
//!
//! Every lookup failure is an [`Error::Configuration`] so callers can abort
//! before any fitting starts.

use crate::pyhf::{HistFactoryModel, PRIMARY_DATASET, Workspace};
use np_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the workspace held by a single-workspace store file.
pub const DEFAULT_WORKSPACE: &str = "combined";

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Named { workspaces: BTreeMap<String, Workspace> },
    Single(Box<Workspace>),
}

/// Workspaces loaded from a store file, by name.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
    workspaces: BTreeMap<String, Workspace>,
}

/// Which workspace, measurement, dataset and POI to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSource {
    /// Store file path
    pub model_path: PathBuf,
    /// Workspace name inside the store
    #[serde(default = "default_workspace_name")]
    pub workspace_name: String,
    /// Measurement name; `None` picks the first measurement
    #[serde(default)]
    pub model_config_name: Option<String>,
    /// Dataset name; `obsData` is the workspace's own observations
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
    /// POI override; `None` keeps the measurement's POI
    #[serde(default)]
    pub poi_name: Option<String>,
}

fn default_workspace_name() -> String {
    DEFAULT_WORKSPACE.to_string()
}

fn default_dataset_name() -> String {
    PRIMARY_DATASET.to_string()
}

impl ModelSource {
    /// Source with default names for a store file.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            workspace_name: default_workspace_name(),
            model_config_name: None,
            dataset_name: default_dataset_name(),
            poi_name: None,
        }
    }
}

/// A model resolved from a store, with the names that selected it.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// The likelihood model
    pub model: HistFactoryModel,
    /// Workspace name
    pub workspace_name: String,
    /// Measurement name
    pub measurement_name: String,
    /// Dataset name
    pub dataset_name: String,
    /// POI name
    pub poi_name: String,
}

impl ModelStore {
    /// Read and parse a store file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::Configuration(format!("Model file not found: {}", path.display())));
        }
        let bytes = std::fs::read(path)?;
        let parsed: StoreFile = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Configuration(format!("Cannot parse model file {}: {}", path.display(), e))
        })?;
        Ok(Self::from_parsed(path.to_path_buf(), parsed))
    }

    /// Parse a store from an in-memory JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: StoreFile = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Cannot parse model store: {}", e)))?;
        Ok(Self::from_parsed(PathBuf::from("<memory>"), parsed))
    }

    fn from_parsed(path: PathBuf, parsed: StoreFile) -> Self {
        let workspaces = match parsed {
            StoreFile::Named { workspaces } => workspaces,
            StoreFile::Single(ws) => BTreeMap::from([(DEFAULT_WORKSPACE.to_string(), *ws)]),
        };
        log::debug!("model store {}: {} workspace(s)", path.display(), workspaces.len());
        Self { path, workspaces }
    }

    /// Workspace names, sorted.
    pub fn workspace_names(&self) -> Vec<&str> {
        self.workspaces.keys().map(String::as_str).collect()
    }

    /// Look up a workspace by name.
    pub fn workspace(&self, name: &str) -> Result<&Workspace> {
        self.workspaces.get(name).ok_or_else(|| {
            Error::Configuration(format!(
                "Workspace '{}' not found in {} (available: {})",
                name,
                self.path.display(),
                self.workspace_names().join(", ")
            ))
        })
    }

    /// Resolve workspace, measurement, dataset and POI and build the model.
    pub fn load(&self, source: &ModelSource) -> Result<LoadedModel> {
        let ws = self.workspace(&source.workspace_name)?;

        let measurement = match source.model_config_name.as_deref() {
            Some(name) => ws.measurement(name).ok_or_else(|| {
                Error::Configuration(format!(
                    "Measurement '{}' not found in workspace '{}'",
                    name, source.workspace_name
                ))
            })?,
            None => ws.measurements.first().ok_or_else(|| {
                Error::Configuration(format!(
                    "Workspace '{}' has no measurements",
                    source.workspace_name
                ))
            })?,
        };

        let observations = ws.dataset(&source.dataset_name).ok_or_else(|| {
            Error::Configuration(format!(
                "Dataset '{}' not found in workspace '{}' (available: {})",
                source.dataset_name,
                source.workspace_name,
                ws.dataset_names().join(", ")
            ))
        })?;

        let mut measurement = measurement.clone();
        if let Some(poi) = &source.poi_name {
            if !ws.has_modifier(poi) {
                return Err(Error::Configuration(format!(
                    "POI '{}' not found in workspace '{}'",
                    poi, source.workspace_name
                )));
            }
            measurement.config.poi = poi.clone();
        }

        let model = HistFactoryModel::from_parts(ws, &measurement, observations)?;
        log::info!(
            "loaded workspace '{}' measurement '{}' dataset '{}': {} parameters",
            source.workspace_name,
            measurement.name,
            source.dataset_name,
            model.n_params()
        );

        Ok(LoadedModel {
            model,
            workspace_name: source.workspace_name.clone(),
            measurement_name: measurement.name.clone(),
            dataset_name: source.dataset_name.clone(),
            poi_name: measurement.config.poi.clone(),
        })
    }
}

/// Open the store named by `source.model_path` and load the selected model.
pub fn load_model(source: &ModelSource) -> Result<LoadedModel> {
    ModelStore::open(&source.model_path)?.load(source)
}
