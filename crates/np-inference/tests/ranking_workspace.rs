//! Impact ranking on the ranking workspace fixture, through the real
//! likelihood and optimizer.

use np_inference::{
    ImpactConfig, ImpactOrder, MaximumLikelihoodEstimator, MleEngine, NuisanceFilter, ShiftOutcome,
    rank_impacts,
};
use np_translate::{ModelSource, load_model};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures").join(name)
}

fn engine(source: &ModelSource) -> MleEngine<np_translate::HistFactoryModel> {
    let loaded = load_model(source).unwrap();
    MleEngine::new(loaded.model, MaximumLikelihoodEstimator::new()).unwrap()
}

#[test]
fn test_rank_fixture_model_order() {
    let source = ModelSource::new(fixture("ranking_workspace.json"));
    let report = rank_impacts(&engine(&source), &ImpactConfig::default()).unwrap();

    assert_eq!(report.poi, "mu");
    assert!(report.nominal_converged);
    assert!(report.mu_hat > 0.0 && report.mu_hat < 3.0, "mu_hat = {}", report.mu_hat);
    assert!(report.err_hi > 0.0);
    assert!(report.err_lo < 0.0);

    let names: Vec<&str> = report.impacts.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha_sigxs", "alpha_jes1", "alpha_shape"]);
    assert_eq!(report.n_unavailable, 0);

    for r in &report.impacts {
        // Post-fit errors are never larger than the unit prior.
        assert!(r.error_hi.unwrap() <= 1.05, "{}: {:?}", r.name, r.error_hi);
        assert!(r.pull.is_some());
        for shift in [&r.prefit_up, &r.prefit_down, &r.postfit_up, &r.postfit_down] {
            assert!(matches!(shift, ShiftOutcome::Shifted { .. }), "{}: {:?}", r.name, shift);
        }
        // Moving an NP up and down pushes the POI in opposite directions.
        let up = r.prefit_up.delta().unwrap();
        let down = r.prefit_down.delta().unwrap();
        assert!(up * down <= 0.0, "{}: up {} down {}", r.name, up, down);
    }

    // Raising the signal cross-section systematic must lower the fitted signal strength.
    let sigxs = &report.impacts[0];
    assert!(sigxs.prefit_up.delta().unwrap() < 0.0);
    assert!(sigxs.prefit_down.delta().unwrap() > 0.0);
}

#[test]
fn test_rank_fixture_impact_order_and_fixed_np() {
    let mut source = ModelSource::new(fixture("ranking_workspace.json"));
    source.model_config_name = Some("FixedJes".to_string());
    let config = ImpactConfig { order: ImpactOrder::Impact, ..Default::default() };
    let report = rank_impacts(&engine(&source), &config).unwrap();

    let names: Vec<&str> = report.impacts.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&"alpha_jes1"));
    let impacts: Vec<f64> = report.impacts.iter().map(|r| r.max_abs_impact()).collect();
    assert!(impacts[0] >= impacts[1]);
}

#[test]
fn test_rank_zero_matches() {
    let mut source = ModelSource::new(fixture("store_multi.json"));
    source.workspace_name = "nosyst".to_string();
    let report = rank_impacts(&engine(&source), &ImpactConfig::default()).unwrap();
    assert!(report.impacts.is_empty());
    assert_eq!(report.filter, "alpha_");
    assert!(report.mu_hat.is_finite());
}

#[test]
fn test_rank_custom_filter() {
    let source = ModelSource::new(fixture("ranking_workspace.json"));
    let config = ImpactConfig {
        filter: NuisanceFilter::new("staterror"),
        prefit_step: 0.05,
        ..Default::default()
    };
    let report = rank_impacts(&engine(&source), &config).unwrap();
    let names: Vec<&str> = report.impacts.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["staterror_SR[0]", "staterror_SR[1]", "staterror_SR[2]"]);
}

#[test]
fn test_rank_fixture_with_minos_errors() {
    let source = ModelSource::new(fixture("ranking_workspace.json"));
    let config = ImpactConfig { minos: true, ..Default::default() };
    let report = rank_impacts(&engine(&source), &config).unwrap();

    assert!(report.nominal_converged);
    assert!(report.err_hi > 0.0 && report.err_lo < 0.0);
    // Profile-likelihood errors on a Poisson POI are not symmetric.
    assert!(
        (report.err_hi + report.err_lo).abs() > 1e-3,
        "err_hi = {}, err_lo = {}",
        report.err_hi,
        report.err_lo
    );

    assert_eq!(report.impacts.len(), 3);
    for r in &report.impacts {
        let (hi, lo) = (r.error_hi.unwrap(), r.error_lo.unwrap());
        assert!(hi > 0.0 && lo < 0.0, "{}: +{} / {}", r.name, hi, lo);
        assert!(r.postfit_up.is_available() && r.postfit_down.is_available(), "{}", r.name);
    }
}
