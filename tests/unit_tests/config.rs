use fesdc::config::{
    ConvergenceConfig, LinearSolverConfig, MlsdcConfig, Predictor, ProblemConfig, SdcConfig, SweeperConfig,
    TimeConfig,
};
use fesdc::error::SdcError;
use fesdc::quadrature::QuadratureType;
use matrixcompare::assert_scalar_eq;

fn time(t0: f64, dt: f64, t_end: Option<f64>, num_steps: Option<usize>) -> TimeConfig {
    TimeConfig {
        t0,
        dt,
        t_end,
        num_steps,
    }
}

#[test]
fn defaults_describe_the_2d_heat_scenario() {
    let config = SdcConfig::default();
    assert_eq!(config.discretization.dim, 2);
    assert_eq!(config.discretization.num_elements, 10);
    assert_eq!(config.discretization.basis_order, 1);
    assert_eq!(config.sweeper.num_nodes, 3);
    assert_eq!(config.sweeper.quadrature, QuadratureType::UniformRight);
    assert_eq!(config.sweeper.predictor, Predictor::ImexEuler);
    assert_eq!(config.convergence.max_iterations, 10);

    let interval = config.validate().unwrap();
    assert_eq!(interval.num_steps, 4);
    assert_scalar_eq!(interval.t_end, 0.1, comp = abs, tol = 1e-14);
}

#[test]
fn time_interval_from_end_time_or_step_count() {
    let interval = time(0.0, 0.025, Some(0.1), None).resolve().unwrap();
    assert_eq!(interval.num_steps, 4);

    let interval = time(1.0, 0.5, None, Some(3)).resolve().unwrap();
    assert_scalar_eq!(interval.t_end, 2.5, comp = abs, tol = 1e-14);

    let interval = time(0.0, 0.1, Some(0.3), Some(3)).resolve().unwrap();
    assert_eq!(interval.num_steps, 3);
}

#[test]
fn invalid_time_intervals_are_rejected() {
    let invalid = [
        time(0.0, 0.0, Some(0.1), None),
        time(0.0, -0.1, Some(0.1), None),
        time(0.0, 0.1, None, None),
        time(0.0, 0.1, Some(0.0), None),
        time(0.0, 0.03, Some(0.1), None),
        time(0.0, 0.1, Some(0.3), Some(2)),
        time(0.0, 0.1, None, Some(0)),
    ];
    for config in invalid {
        assert!(
            matches!(config.resolve(), Err(SdcError::Configuration(_))),
            "{config:?} should be rejected"
        );
    }
}

#[test]
fn invalid_components_are_rejected() {
    let sweeper = SweeperConfig {
        num_nodes: 1,
        ..SweeperConfig::default()
    };
    assert!(matches!(sweeper.validate(), Err(SdcError::Configuration(_))));

    let convergence = ConvergenceConfig {
        max_iterations: 0,
        ..ConvergenceConfig::default()
    };
    assert!(matches!(convergence.validate(), Err(SdcError::Configuration(_))));

    let solver = LinearSolverConfig {
        tolerance: 0.0,
        ..LinearSolverConfig::default()
    };
    assert!(matches!(solver.validate(), Err(SdcError::Configuration(_))));

    let problem = ProblemConfig {
        nu: -1.0,
        velocity: None,
    };
    assert!(matches!(problem.validate(2), Err(SdcError::Configuration(_))));

    let problem = ProblemConfig {
        nu: 1.0,
        velocity: Some(vec![1.0]),
    };
    assert!(matches!(
        problem.validate(2),
        Err(SdcError::DimensionMismatch { expected: 2, actual: 1 })
    ));

    let mut config = SdcConfig::default();
    config.discretization.dim = 4;
    assert!(matches!(config.validate(), Err(SdcError::Configuration(_))));
}

#[test]
fn json_sections_are_optional() {
    let json = r#"{
        "discretization": { "dim": 1, "num_elements": 1000 },
        "time": { "num_steps": 8 },
        "sweeper": { "quadrature": "GaussRadau", "predictor": "spread" }
    }"#;
    let config: SdcConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.discretization.dim, 1);
    assert_eq!(config.discretization.basis_order, 1);
    assert_eq!(config.time.t_end, None);
    assert_eq!(config.time.num_steps, Some(8));
    assert_eq!(config.sweeper.quadrature, QuadratureType::GaussRadau);
    assert_eq!(config.sweeper.predictor, Predictor::Spread);
    assert_eq!(config.sweeper.num_nodes, 3);

    let interval = config.validate().unwrap();
    assert_scalar_eq!(interval.t_end, 0.2, comp = abs, tol = 1e-14);
}

#[test]
fn json_rejects_unknown_fields_and_names() {
    let unknown_field = r#"{ "sweeper": { "nodes": 3 } }"#;
    assert!(serde_json::from_str::<SdcConfig>(unknown_field).is_err());

    let unknown_quadrature = r#"{ "sweeper": { "quadrature": "simpson" } }"#;
    assert!(serde_json::from_str::<SdcConfig>(unknown_quadrature).is_err());
}

#[test]
fn json_roundtrip_uses_quadrature_names() {
    let config = SdcConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"uniform-right\""));
    assert!(json.contains("\"imex-euler\""));
    let parsed: SdcConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn coarse_level_is_derived_from_fine_level() {
    let json = r#"{
        "discretization": { "dim": 2, "num_elements": 20, "basis_order": 2 },
        "coarse": { "coarsening_factor": 2, "basis_order": 1, "num_nodes": 2 },
        "sweeper": { "num_nodes": 3, "quadrature": "gauss-lobatto" }
    }"#;
    let config: MlsdcConfig = serde_json::from_str(json).unwrap();
    let coarse = config.coarse_discretization().unwrap();
    assert_eq!(coarse.num_elements, 10);
    assert_eq!(coarse.basis_order, 1);
    assert_eq!(coarse.dim, 2);
    let sweeper = config.coarse_sweeper();
    assert_eq!(sweeper.num_nodes, 2);
    assert_eq!(sweeper.quadrature, QuadratureType::GaussLobatto);
    config.validate().unwrap();

    let mut config = MlsdcConfig::default();
    config.coarse.coarsening_factor = 3;
    assert!(matches!(config.coarse_discretization(), Err(SdcError::Configuration(_))));
    assert!(matches!(config.validate(), Err(SdcError::Configuration(_))));
}

#[test]
fn config_files_are_read() {
    let path = std::env::temp_dir().join("fesdc_config_files_are_read.json");
    std::fs::write(&path, r#"{ "problem": { "nu": 0.5 } }"#).unwrap();
    let config = SdcConfig::from_json_file(&path).unwrap();
    assert_scalar_eq!(config.problem.nu, 0.5);
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(
        SdcConfig::from_json_file(std::env::temp_dir().join("fesdc_missing_config.json")),
        Err(SdcError::Io(_))
    ));
}
