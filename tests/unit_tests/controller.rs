use fesdc::config::{MlsdcConfig, SdcConfig};
use fesdc::controller::{Controller, RunReport, StepReport};
use fesdc::error::SdcError;
use fesdc::fe_manager::FeManager;
use fesdc::space::LagrangeSpace;
use fesdc::splitting::Heat;
use fesdc::sweeper::ImexSweeper;
use fesdc::{Sdc, TwoLevelMlsdc};
use matrixcompare::assert_scalar_eq;

fn small_sdc_config() -> SdcConfig {
    let mut config = SdcConfig::default();
    config.discretization.dim = 1;
    config.discretization.num_elements = 8;
    config.time.t_end = Some(0.05);
    config
}

fn step(step: usize, iterations: usize, residual: f64, converged: bool) -> StepReport {
    StepReport {
        step,
        time: 0.1 * (step + 1) as f64,
        iterations,
        residual,
        solver_failures: 0,
        converged,
    }
}

#[test]
fn run_report_summaries() {
    let report = RunReport {
        steps: vec![step(0, 3, 1e-9, true), step(1, 10, 1e-6, false)],
    };
    assert!(!report.all_converged());
    assert_eq!(report.total_iterations(), 13);
    assert_scalar_eq!(report.final_residual().unwrap(), 1e-6);
    assert!(RunReport::default().all_converged());
    assert!(RunReport::default().final_residual().is_none());
}

#[test]
fn invalid_configuration_is_rejected_before_setup() {
    let mut config = small_sdc_config();
    config.sweeper.num_nodes = 1;
    assert!(matches!(Sdc::heat(config), Err(SdcError::Configuration(_))));

    let mut config = small_sdc_config();
    config.time.dt = 0.0;
    assert!(matches!(Sdc::heat(config), Err(SdcError::Configuration(_))));

    let mut config = MlsdcConfig::default();
    config.convergence.max_iterations = 0;
    assert!(matches!(TwoLevelMlsdc::heat(config), Err(SdcError::Configuration(_))));
}

#[test]
fn run_requires_setup_and_initial_value() {
    let mut sdc = Sdc::heat(small_sdc_config()).unwrap();
    assert!(matches!(sdc.run(), Err(SdcError::InvalidState(_))));
    assert!(matches!(sdc.post_run(), Err(SdcError::InvalidState(_))));
    assert!(matches!(sdc.end_state(), Err(SdcError::InvalidState(_))));

    sdc.setup().unwrap();
    assert!(matches!(sdc.run(), Err(SdcError::InvalidState(_))));

    sdc.set_initial_value_from_exact().unwrap();
    let report = sdc.run().unwrap();
    assert_eq!(report.steps.len(), 2);
    assert!(sdc.report().is_some());
    sdc.post_run().unwrap();
}

#[test]
fn run_without_tolerances_uses_all_iterations() {
    let mut config = small_sdc_config();
    config.convergence.max_iterations = 4;
    let mut sdc = Sdc::heat(config).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    let report = sdc.run().unwrap();
    for (i, step) in report.steps.iter().enumerate() {
        assert_eq!(step.step, i);
        assert_eq!(step.iterations, 4);
        assert!(!step.converged);
        assert_scalar_eq!(step.time, 0.025 * (i + 1) as f64, comp = abs, tol = 1e-14);
    }

    let status = Controller::status(&sdc);
    assert_eq!(status.step(), 2);
    assert_scalar_eq!(status.time(), 0.05, comp = abs, tol = 1e-14);
}

#[test]
fn absolute_tolerance_stops_iterations_early() {
    let mut config = small_sdc_config();
    config.convergence.abs_residual_tol = 1e-8;
    config.convergence.max_iterations = 20;
    let mut sdc = Sdc::heat(config).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    let report = sdc.run().unwrap();
    assert!(report.all_converged());
    for step in &report.steps {
        assert!(step.iterations < 20);
        assert!(step.residual <= 1e-8);
    }
}

#[test]
fn relative_tolerance_stops_iterations_early() {
    let mut config = small_sdc_config();
    config.convergence.rel_residual_tol = 1e-7;
    config.convergence.max_iterations = 20;
    let mut sdc = Sdc::heat(config).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    let report = sdc.run().unwrap();
    assert!(report.all_converged());
    assert!(report.total_iterations() < 40);
}

#[test]
fn capped_linear_solves_prevent_sdc_convergence() {
    let mut config = SdcConfig::default();
    config.solver.max_iterations = 1;
    config.convergence.abs_residual_tol = 1e-14;
    let mut sdc = Sdc::heat(config).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    let report = sdc.run().unwrap();

    assert!(!report.all_converged());
    for step in &report.steps {
        assert!(!step.converged);
        assert!(step.solver_failures > 0);
        assert_eq!(step.solver_failures, sdc.sweeper().solver_failures_in_step(step.step));
    }
    let reported: usize = report.steps.iter().map(|step| step.solver_failures).sum();
    assert_eq!(reported, sdc.sweeper().total_solver_failures());
}

#[test]
fn capped_linear_solves_prevent_mlsdc_convergence() {
    let mut config = MlsdcConfig::default();
    config.time.t_end = Some(0.05);
    config.solver.max_iterations = 1;
    config.convergence.abs_residual_tol = 1e-14;
    let mut mlsdc = TwoLevelMlsdc::heat(config).unwrap();
    mlsdc.setup().unwrap();
    mlsdc.set_initial_value_from_exact().unwrap();
    let report = mlsdc.run().unwrap();

    assert!(!report.all_converged());
    for step in &report.steps {
        assert!(!step.converged);
        assert!(step.solver_failures > 0);
    }
}

#[test]
fn converged_steps_report_no_solver_failures() {
    let mut config = small_sdc_config();
    config.convergence.abs_residual_tol = 1e-8;
    config.convergence.max_iterations = 20;
    let mut sdc = Sdc::heat(config).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    let report = sdc.run().unwrap();
    assert!(report.all_converged());
    assert!(report.steps.iter().all(|step| step.solver_failures == 0));
}

#[test]
fn repeated_runs_start_from_the_initial_value() {
    let mut sdc = Sdc::heat(small_sdc_config()).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    let first = sdc.run().unwrap();
    let first_end = sdc.end_state().unwrap();
    let first_residuals = sdc.sweeper().residuals().clone();

    let second = sdc.run().unwrap();
    assert_eq!(first, second);
    assert_eq!(&first_residuals, sdc.sweeper().residuals());
    assert_eq!(first_end, sdc.end_state().unwrap());

    let mut config = MlsdcConfig::default();
    config.discretization.dim = 1;
    config.discretization.num_elements = 16;
    config.coarse.coarsening_factor = 2;
    config.time.t_end = Some(0.05);
    let mut mlsdc = TwoLevelMlsdc::heat(config).unwrap();
    mlsdc.setup().unwrap();
    mlsdc.set_initial_value_from_exact().unwrap();
    let first = mlsdc.run().unwrap();
    let first_end = mlsdc.end_state().unwrap();
    let second = mlsdc.run().unwrap();
    assert_eq!(first, second);
    assert_eq!(first_end, mlsdc.end_state().unwrap());
}

#[test]
fn advection_diffusion_has_no_reference_solution() {
    let mut config = small_sdc_config();
    config.problem.velocity = Some(vec![1.0]);
    let mut sdc = Sdc::advection_diffusion(config).unwrap();
    sdc.setup().unwrap();
    assert!(matches!(sdc.set_initial_value_from_exact(), Err(SdcError::Configuration(_))));

    let space = sdc.fe().level(sdc.sweeper().level()).unwrap().space().clone();
    let u0 = space.interpolate(fesdc::splitting::sine_product);
    sdc.set_initial_value(&u0).unwrap();
    let report = sdc.run().unwrap();
    assert!(report.final_residual().unwrap().is_finite());
}

#[test]
fn mlsdc_levels_must_differ() {
    let config = MlsdcConfig::default();
    let mut fe = FeManager::new();
    let level = fe.add_level(LagrangeSpace::unit_hypercube(2, 10, 1).unwrap());
    let coarse = ImexSweeper::new(Heat::new(0.1, config.solver.clone()), level, config.coarse_sweeper());
    let fine = ImexSweeper::new(Heat::new(0.1, config.solver.clone()), level, config.sweeper.clone());
    assert!(matches!(
        TwoLevelMlsdc::new(config, fe, coarse, fine),
        Err(SdcError::Configuration(_))
    ));
}

#[test]
fn mlsdc_with_non_nested_nodes_fails_in_setup() {
    let mut config = MlsdcConfig::default();
    config.discretization.dim = 1;
    config.coarse.num_nodes = Some(2);
    config.sweeper.num_nodes = 3;
    let mut mlsdc = TwoLevelMlsdc::heat(config).unwrap();
    assert!(matches!(mlsdc.setup(), Err(SdcError::Configuration(_))));
    assert!(matches!(mlsdc.transfer(), Err(SdcError::InvalidState(_))));
}
