//! npimpact CLI

mod config;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{RankArgs, RunArgs, RunConfig};
use np_inference::{ErrorMode, FitEngine, MaximumLikelihoodEstimator, MleEngine, rank_impacts};
use np_translate::{HistFactoryModel, load_model};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "npimpact")]
#[command(about = "npimpact - nuisance-parameter impact ranking for binned likelihoods")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Nominal fit, then pre-/post-fit impact of every matching nuisance parameter
    Rank {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        rank: RankArgs,

        /// Also write the report as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Nominal fit only (pretty JSON)
    Fit {
        #[command(flatten)]
        run: RunArgs,

        /// Output file for results. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports and JSON go to stdout; logs never do.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Rank { run, rank, output } => {
            let cfg = RunConfig::resolve(&run, &rank)?;
            cmd_rank(&cfg, output.as_ref())
        }
        Commands::Fit { run, output } => {
            let cfg = RunConfig::resolve(&run, &RankArgs::default())?;
            cmd_fit(&cfg, output.as_ref())
        }
        Commands::Version => {
            println!("npimpact {}", np_core::VERSION);
            Ok(())
        }
    }
}

fn build_engine(cfg: &RunConfig) -> Result<MleEngine<HistFactoryModel>> {
    let source = cfg.model_source()?;
    tracing::info!(path = %source.model_path.display(), workspace = %source.workspace_name, "loading model");
    let loaded = load_model(&source).context("loading model")?;
    tracing::info!(
        measurement = %loaded.measurement_name,
        dataset = %loaded.dataset_name,
        poi = %loaded.poi_name,
        parameters = loaded.model.n_params(),
        "model loaded"
    );
    let mle = MaximumLikelihoodEstimator::with_config(cfg.optimizer.clone());
    Ok(MleEngine::new(loaded.model, mle)?)
}

fn thread_pool(threads: usize) -> Result<rayon::ThreadPool> {
    // 0 lets rayon pick the number of threads.
    Ok(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
}

fn cmd_rank(cfg: &RunConfig, output: Option<&PathBuf>) -> Result<()> {
    let engine = build_engine(cfg)?;
    let impact_cfg = cfg.impact_config();
    let pool = thread_pool(cfg.threads)?;

    let report = pool.install(|| rank_impacts(&engine, &impact_cfg))?;
    tracing::info!(
        impacts = report.impacts.len(),
        unavailable = report.n_unavailable,
        "ranking complete"
    );

    print!("{}", report::render_text(&report));
    if let Some(path) = output {
        report::write_json(Some(path.as_path()), &report::impact_json(&report)?)?;
    }
    Ok(())
}

fn cmd_fit(cfg: &RunConfig, output: Option<&PathBuf>) -> Result<()> {
    let engine = build_engine(cfg)?;
    let pool = thread_pool(cfg.threads)?;

    let mut state = engine.initial_state();
    state.set_constant(engine.poi_name(), false)?;
    let errors = if cfg.minos {
        ErrorMode::Minos(state.floating_indices())
    } else {
        ErrorMode::Hesse
    };
    let fit = pool.install(|| engine.fit(&state, &errors))?;
    tracing::info!(nll = fit.nll, converged = fit.converged, "fit complete");
    if !fit.converged && !cfg.accept_unconverged {
        anyhow::bail!(np_core::Error::Convergence(fit.message));
    }

    let names: Vec<String> = state.parameters().iter().map(|p| p.name.clone()).collect();
    let value = report::fit_json(&names, engine.poi_name(), &fit);
    report::write_json(output.map(PathBuf::as_path), &value)
}
