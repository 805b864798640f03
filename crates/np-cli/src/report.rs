//! Text and JSON rendering of impact reports and fits.

use anyhow::Result;
use np_core::FitResult;
use np_inference::{ImpactReport, ShiftOutcome};
use std::path::Path;

const RULE: &str = "---------------------------------";

fn signed(v: f64) -> String {
    if v.is_finite() { format!("{:+.3}", v) } else { "n/a".to_string() }
}

fn shift(s: &ShiftOutcome) -> String {
    s.delta().map(signed).unwrap_or_else(|| "n/a".to_string())
}

/// Human-readable impact table.
pub fn render_text(report: &ImpactReport) -> String {
    let mut lines = vec![
        RULE.to_string(),
        "Nominal fit:".to_string(),
        format!(
            "  POI = {} {} /  {}",
            signed(report.mu_hat),
            signed(report.err_hi),
            signed(report.err_lo)
        ),
    ];

    for r in &report.impacts {
        lines.push(RULE.to_string());
        lines.push(format!("Impact of NP {}", r.name));
        lines.push(format!("  Pre-fit  impact = {} / {}", shift(&r.prefit_up), shift(&r.prefit_down)));
        lines.push(format!("  Post-fit impact = {} / {}", shift(&r.postfit_up), shift(&r.postfit_down)));
    }
    if report.impacts.is_empty() {
        lines.push(RULE.to_string());
        lines.push(format!("No nuisance parameters matched filter '{}'", report.filter));
    }
    lines.push(RULE.to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn impact_json(report: &ImpactReport) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(report)?)
}

pub fn fit_json(names: &[String], poi: &str, fit: &FitResult) -> serde_json::Value {
    serde_json::json!({
        "poi": poi,
        "parameter_names": names,
        "bestfit": fit.parameters,
        "uncertainties": fit.uncertainties,
        "errors_hi": fit.errors_hi,
        "errors_lo": fit.errors_lo,
        "nll": fit.nll,
        "converged": fit.converged,
        "n_iter": fit.n_iter,
        "n_fev": fit.n_fev,
        "n_gev": fit.n_gev,
        "message": fit.message,
        "covariance": fit.covariance,
        "warnings": fit.warnings,
    })
}

pub fn write_json(output: Option<&Path>, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{}", text),
    }
    Ok(())
}
