use crate::integration_tests::{heat_1d_config, mlsdc_config_from};
use fesdc::config::MlsdcConfig;
use fesdc::error::SdcError;
use fesdc::quadrature::QuadratureType;
use fesdc::splitting::Heat;
use fesdc::{Controller, Sdc, TwoLevelMlsdc};
use matrixcompare::assert_matrix_eq;

fn final_error_sdc(sdc: &Sdc<Heat>) -> f64 {
    let t_end = Controller::status(sdc).time();
    let exact = sdc.sweeper().exact(sdc.fe(), t_end).unwrap().unwrap();
    (sdc.end_state().unwrap() - exact).amax()
}

fn final_error_mlsdc(mlsdc: &TwoLevelMlsdc<Heat, Heat>) -> f64 {
    let t_end = Controller::status(mlsdc).time();
    let exact = mlsdc.fine().exact(mlsdc.fe(), t_end).unwrap().unwrap();
    (mlsdc.end_state().unwrap() - exact).amax()
}

fn run_mlsdc(config: MlsdcConfig) -> TwoLevelMlsdc<Heat, Heat> {
    let mut mlsdc = TwoLevelMlsdc::heat(config).unwrap();
    mlsdc.setup().unwrap();
    mlsdc.set_initial_value_from_exact().unwrap();
    mlsdc.run().unwrap();
    mlsdc.post_run().unwrap();
    mlsdc
}

#[test]
fn mlsdc_with_identical_levels_matches_sdc() {
    let sdc_config = heat_1d_config(100);
    let mut sdc = Sdc::heat(sdc_config.clone()).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    sdc.run().unwrap();
    let sdc_error = final_error_sdc(&sdc);

    let mlsdc = run_mlsdc(mlsdc_config_from(&sdc_config));
    let mlsdc_error = final_error_mlsdc(&mlsdc);
    assert!(
        mlsdc_error <= 1.05 * sdc_error + 1e-7,
        "MLSDC error {mlsdc_error:e}, SDC error {sdc_error:e}"
    );
    assert_matrix_eq!(
        mlsdc.end_state().unwrap(),
        sdc.end_state().unwrap(),
        comp = abs,
        tol = 1e-8
    );
}

#[test]
fn mlsdc_with_coarse_grid_converges() {
    let mut config = mlsdc_config_from(&heat_1d_config(64));
    config.coarse.coarsening_factor = 2;
    config.sweeper.quadrature = QuadratureType::GaussRadau;
    config.convergence.abs_residual_tol = 1e-10;
    config.convergence.max_iterations = 20;
    let mlsdc = run_mlsdc(config);

    let report = mlsdc.report().unwrap();
    assert!(report.all_converged());
    assert!(report.final_residual().unwrap() <= 1e-10);
    let error = final_error_mlsdc(&mlsdc);
    // 64 linear elements
    assert!(error < 2e-4, "error {error:e}");
}

#[test]
fn mlsdc_with_fewer_coarse_nodes_converges() {
    let mut config = mlsdc_config_from(&heat_1d_config(32));
    config.coarse.coarsening_factor = 2;
    config.sweeper.quadrature = QuadratureType::GaussLobatto;
    config.sweeper.num_nodes = 5;
    config.coarse.num_nodes = Some(3);
    config.convergence.abs_residual_tol = 1e-10;
    config.convergence.max_iterations = 30;
    let mlsdc = run_mlsdc(config);
    assert!(mlsdc.report().unwrap().all_converged());
    assert_eq!(mlsdc.transfer().unwrap().time_injection(), &[0, 2, 4]);
}

#[test]
fn mlsdc_with_lower_coarse_order() {
    let mut config = mlsdc_config_from(&heat_1d_config(16));
    config.discretization.basis_order = 2;
    config.coarse.basis_order = Some(1);
    config.convergence.abs_residual_tol = 1e-10;
    config.convergence.max_iterations = 30;
    let mlsdc = run_mlsdc(config);
    let report = mlsdc.report().unwrap();
    assert!(report.final_residual().unwrap() < 1e-8);
    assert!(final_error_mlsdc(&mlsdc) < 1e-4);
}

#[test]
fn coarse_initial_value_is_seeded_by_restriction() {
    let mut config = mlsdc_config_from(&heat_1d_config(32));
    config.coarse.coarsening_factor = 4;
    let mlsdc = run_mlsdc(config);

    // Both levels hold the values of the last step
    let transfer = mlsdc.transfer().unwrap();
    let expected = transfer.restrict(mlsdc.fine().initial_value().unwrap()).unwrap();
    assert_matrix_eq!(mlsdc.coarse().initial_value().unwrap().clone(), expected, comp = abs, tol = 1e-15);
}

#[test]
fn non_nested_coarse_nodes_are_rejected() {
    let mut config = mlsdc_config_from(&heat_1d_config(16));
    config.sweeper.quadrature = QuadratureType::GaussRadau;
    config.coarse.num_nodes = Some(2);
    let mut mlsdc = TwoLevelMlsdc::heat(config).unwrap();
    assert!(matches!(mlsdc.setup(), Err(SdcError::Configuration(_))));
}
