//! Tests for pyhf parser and model construction

use super::model::HistFactoryModel;
use super::schema::*;
use np_core::{Error, LogDensityModel, PoiModel};

fn ranking_workspace() -> Workspace {
    let json = include_str!("../../../../tests/fixtures/ranking_workspace.json");
    serde_json::from_str(json).expect("Failed to parse ranking_workspace.json")
}

#[test]
fn test_parse_ranking_workspace() {
    let ws = ranking_workspace();

    assert_eq!(ws.channels.len(), 2);
    assert!(ws.channels.iter().any(|c| c.name == "SR"));
    assert!(ws.channels.iter().any(|c| c.name == "CR"));
    assert_eq!(ws.observations.len(), 2);
    assert_eq!(ws.measurements.len(), 2);
    assert_eq!(ws.measurements[0].config.poi, "mu");
    assert_eq!(ws.dataset_names(), vec!["obsData", "asimovData"]);
    assert!(ws.dataset("asimovData").is_some());
    assert!(ws.dataset("toyData").is_none());
    assert!(ws.measurement("FixedJes").is_some());
}

#[test]
fn test_parse_all_modifier_types() {
    let ws = ranking_workspace();
    let mut found = std::collections::HashSet::new();
    for modifier in ws.channels.iter().flat_map(|c| &c.samples).flat_map(|s| &s.modifiers) {
        let t = match modifier {
            Modifier::NormFactor { .. } => "normfactor",
            Modifier::NormSys { .. } => "normsys",
            Modifier::HistoSys { .. } => "histosys",
            Modifier::ShapeSys { .. } => "shapesys",
            Modifier::ShapeFactor { .. } => "shapefactor",
            Modifier::StatError { .. } => "staterror",
            Modifier::Lumi { .. } => "lumi",
        };
        found.insert(t);
    }
    for t in ["normfactor", "normsys", "histosys", "staterror", "lumi"] {
        assert!(found.contains(t), "missing modifier type {}", t);
    }
}

#[test]
fn test_model_parameter_layout() {
    let model = HistFactoryModel::from_workspace(&ranking_workspace()).unwrap();
    let names = model.parameter_names();
    assert_eq!(names[0], "mu");
    assert_eq!(model.poi_index(), Some(0));
    for expected in [
        "alpha_sigxs",
        "lumi",
        "alpha_jes1",
        "alpha_shape",
        "staterror_SR[0]",
        "staterror_SR[2]",
        "mu_bkg",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing parameter {}", expected);
    }
    assert_eq!(model.channel_names(), vec!["CR", "SR"]);

    let lumi = model.parameters().iter().find(|p| p.name == "lumi").unwrap();
    assert_eq!(lumi.constraint_width, Some(0.017));
    assert_eq!(lumi.bounds, (0.9, 1.1));

    // staterror: sigma_rel = 5 / 100 for the first SR bin
    let gamma0 = model.parameters().iter().find(|p| p.name == "staterror_SR[0]").unwrap();
    assert!((gamma0.constraint_width.unwrap() - 0.05).abs() < 1e-12);

    // Everything except the POI is a nuisance parameter in the nominal measurement.
    assert_eq!(model.nuisance_indices().len(), model.n_params() - 1);
}

#[test]
fn test_fixed_parameter_from_measurement() {
    let ws = ranking_workspace();
    let measurement = ws.measurement("FixedJes").unwrap();
    let model = HistFactoryModel::from_parts(&ws, measurement, &ws.observations).unwrap();
    let idx = model.parameter_names().iter().position(|n| n == "alpha_jes1").unwrap();
    assert!(model.parameter_fixed()[idx]);
    assert!(!model.nuisance_indices().contains(&idx));
}

#[test]
fn test_expected_data_at_nominal() {
    let model = HistFactoryModel::from_workspace(&ranking_workspace()).unwrap();
    let init = model.parameter_init();
    let expected = model.expected_data(&init).unwrap();
    // Channels sorted: CR (2 bins) then SR (3 bins).
    assert_eq!(expected.len(), 5);
    let want = [501.0, 451.0, 112.0, 98.0, 49.0];
    for (got, want) in expected.iter().zip(want) {
        assert!((got - want).abs() < 1e-9, "expected {} got {}", want, got);
    }
}

#[test]
fn test_nll_finite_and_gradient_matches_direction() {
    let model = HistFactoryModel::from_workspace(&ranking_workspace()).unwrap();
    let init = model.parameter_init();
    let nll = model.nll(&init).unwrap();
    assert!(nll.is_finite());

    let grad = model.grad_nll(&init).unwrap();
    assert_eq!(grad.len(), model.n_params());
    // Observed SR/CR are above expectation at mu=1 → increasing mu lowers the NLL.
    assert!(grad[0] < 0.0, "d NLL / d mu should be negative, got {}", grad[0]);
}

#[test]
fn test_missing_poi_is_configuration_error() {
    let mut ws = ranking_workspace();
    ws.measurements[0].config.poi = "mu_ttH".to_string();
    let err = HistFactoryModel::from_workspace(&ws).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);
}

#[test]
fn test_missing_channel_observation_is_configuration_error() {
    let mut ws = ranking_workspace();
    ws.observations.retain(|o| o.name != "CR");
    let err = HistFactoryModel::from_workspace(&ws).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);
}

#[test]
fn test_bin_length_mismatch_is_validation_error() {
    let mut ws = ranking_workspace();
    ws.observations[0].data.push(1.0);
    let err = HistFactoryModel::from_workspace(&ws).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
}
