//! Run configuration: YAML (or JSON) file merged with command-line flags.

use anyhow::{Context, Result};
use clap::Args;
use np_core::Error;
use np_inference::{ImpactConfig, ImpactOrder, NuisanceFilter, OptimizerConfig};
use np_translate::ModelSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Model store file.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default = "default_workspace_name")]
    pub workspace_name: String,
    /// Measurement; first one in the workspace when absent.
    #[serde(default)]
    pub model_config_name: Option<String>,
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
    /// POI override; the measurement's POI when absent.
    #[serde(default)]
    pub poi_name: Option<String>,
    #[serde(default = "default_filter")]
    pub nuisance_name_filter: String,
    #[serde(default = "default_prefit_step")]
    pub prefit_step: f64,
    #[serde(default)]
    pub minos: bool,
    #[serde(default)]
    pub accept_unconverged: bool,
    #[serde(default)]
    pub order: ImpactOrder,
    /// Threads (0 = auto). Use 1 for deterministic, sequential evaluation.
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

fn default_workspace_name() -> String {
    np_translate::DEFAULT_WORKSPACE.to_string()
}

fn default_dataset_name() -> String {
    np_translate::PRIMARY_DATASET.to_string()
}

fn default_filter() -> String {
    np_inference::impact::DEFAULT_NP_MARKER.to_string()
}

fn default_prefit_step() -> f64 {
    1.0
}

fn default_threads() -> usize {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            workspace_name: default_workspace_name(),
            model_config_name: None,
            dataset_name: default_dataset_name(),
            poi_name: None,
            nuisance_name_filter: default_filter(),
            prefit_step: default_prefit_step(),
            minos: false,
            accept_unconverged: false,
            order: ImpactOrder::Model,
            threads: default_threads(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::Configuration(format!("Cannot read config {}: {}", path.display(), e)))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Configuration(format!("Invalid config {}: {}", path.display(), e)))?
    } else {
        serde_yaml_ng::from_slice(&bytes)
            .map_err(|e| Error::Configuration(format!("Invalid config {}: {}", path.display(), e)))?
    };
    Ok(cfg)
}

/// Flags shared by the `rank` and `fit` subcommands. Each one overrides the
/// matching config-file key.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Run config (YAML, or JSON with a `.json` extension)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model store file (pyhf JSON workspace or `{"workspaces": {...}}`)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Workspace name inside the store
    #[arg(long)]
    pub workspace: Option<String>,

    /// Measurement name
    #[arg(long)]
    pub measurement: Option<String>,

    /// Dataset name
    #[arg(long)]
    pub dataset: Option<String>,

    /// POI name
    #[arg(long)]
    pub poi: Option<String>,

    /// Profile-likelihood (Minos) errors
    #[arg(long)]
    pub minos: bool,

    /// Keep going with non-converged fits
    #[arg(long)]
    pub accept_unconverged: bool,

    /// Threads (0 = auto). Use 1 for deterministic, sequential evaluation.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Optimizer iteration limit
    #[arg(long)]
    pub max_iter: Option<u64>,

    /// Optimizer gradient tolerance
    #[arg(long)]
    pub tol: Option<f64>,
}

/// Flags only the `rank` subcommand takes.
#[derive(Debug, Clone, Default, Args)]
pub struct RankArgs {
    /// Substring that marks eligible nuisance parameters
    #[arg(long)]
    pub filter: Option<String>,

    /// Pre-fit perturbation size
    #[arg(long)]
    pub prefit_step: Option<f64>,

    /// Output order: `model` or `impact`
    #[arg(long)]
    pub order: Option<ImpactOrder>,
}

impl RunConfig {
    /// Load the config file named by `args` (if any) and apply flag overrides.
    pub fn resolve(args: &RunArgs, rank: &RankArgs) -> Result<Self> {
        let mut cfg = match &args.config {
            Some(path) => read_run_config(path)
                .with_context(|| format!("loading run config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(v) = &args.model {
            cfg.model_path = Some(v.clone());
        }
        if let Some(v) = &args.workspace {
            cfg.workspace_name = v.clone();
        }
        if let Some(v) = &args.measurement {
            cfg.model_config_name = Some(v.clone());
        }
        if let Some(v) = &args.dataset {
            cfg.dataset_name = v.clone();
        }
        if let Some(v) = &args.poi {
            cfg.poi_name = Some(v.clone());
        }
        cfg.minos |= args.minos;
        cfg.accept_unconverged |= args.accept_unconverged;
        if let Some(v) = args.threads {
            cfg.threads = v;
        }
        if let Some(v) = args.max_iter {
            cfg.optimizer.max_iter = v;
        }
        if let Some(v) = args.tol {
            cfg.optimizer.tol = v;
        }
        if let Some(v) = &rank.filter {
            cfg.nuisance_name_filter = v.clone();
        }
        if let Some(v) = rank.prefit_step {
            cfg.prefit_step = v;
        }
        if let Some(v) = rank.order {
            cfg.order = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> std::result::Result<(), Error> {
        if self.model_path.is_none() {
            return Err(Error::Configuration(
                "No model given: pass --model or set model_path in the config".to_string(),
            ));
        }
        if !(self.prefit_step.is_finite() && self.prefit_step > 0.0) {
            return Err(Error::Configuration(format!(
                "prefit_step must be positive, got {}",
                self.prefit_step
            )));
        }
        if self.nuisance_name_filter.is_empty() {
            return Err(Error::Configuration("nuisance_name_filter must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn model_source(&self) -> std::result::Result<ModelSource, Error> {
        let model_path = self
            .model_path
            .clone()
            .ok_or_else(|| Error::Configuration("model_path is not set".to_string()))?;
        Ok(ModelSource {
            model_path,
            workspace_name: self.workspace_name.clone(),
            model_config_name: self.model_config_name.clone(),
            dataset_name: self.dataset_name.clone(),
            poi_name: self.poi_name.clone(),
        })
    }

    pub fn impact_config(&self) -> ImpactConfig {
        ImpactConfig {
            filter: NuisanceFilter::new(self.nuisance_name_filter.clone()),
            prefit_step: self.prefit_step,
            minos: self.minos,
            accept_unconverged: self.accept_unconverged,
            order: self.order,
        }
    }
}
