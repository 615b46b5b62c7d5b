use crate::convergence_tests::ErrorSummary;
use fesdc::config::{LinearSolverConfig, SdcConfig};
use fesdc::quadrature::QuadratureType;
use fesdc::Sdc;
use nalgebra::DVector;

const T_END: f64 = 0.1;

fn radau_config(dt: f64, max_iterations: usize) -> SdcConfig {
    let mut config = SdcConfig::default();
    config.discretization.dim = 1;
    config.discretization.num_elements = 64;
    config.problem.nu = 1.0;
    config.sweeper.quadrature = QuadratureType::GaussRadau;
    config.sweeper.num_nodes = 2;
    config.time.dt = dt;
    config.time.t_end = Some(T_END);
    config.convergence.max_iterations = max_iterations;
    config.solver = LinearSolverConfig {
        tolerance: 1e-13,
        max_iterations: 2000,
    };
    config
}

fn end_state(config: SdcConfig) -> DVector<f64> {
    let mut sdc = Sdc::heat(config).unwrap();
    sdc.setup().unwrap();
    sdc.set_initial_value_from_exact().unwrap();
    sdc.run().unwrap();
    sdc.end_state().unwrap()
}

/// Errors against a collocation solution with a much smaller step on the same mesh, so that
/// only the temporal error is measured.
fn temporal_errors(name: &str, max_iterations: usize) -> ErrorSummary {
    let mut reference_config = radau_config(T_END / 64.0, 50);
    reference_config.convergence.abs_residual_tol = 1e-14;
    let reference = end_state(reference_config);

    let mut summary = ErrorSummary::new(name);
    for num_steps in [4, 8, 16] {
        let dt = T_END / num_steps as f64;
        let mut config = radau_config(dt, max_iterations);
        if max_iterations > 1 {
            config.convergence.abs_residual_tol = 1e-14;
        }
        let error = (end_state(config) - &reference).amax();
        summary.push(dt, error);
    }
    summary.write_to_data_dir();
    summary
}

#[test]
fn converged_radau_collocation_is_third_order() {
    let summary = temporal_errors("heat_1d_radau2_converged", 50);
    let rates = summary.rates();
    let finest_rate = *rates.last().unwrap();
    assert!(finest_rate > 2.7, "rates {rates:?}, errors {:?}", summary.errors);
}

#[test]
fn single_sweep_after_euler_predictor_is_second_order() {
    let summary = temporal_errors("heat_1d_radau2_single_sweep", 1);
    let rates = summary.rates();
    let finest_rate = *rates.last().unwrap();
    assert!(finest_rate > 1.7, "rates {rates:?}, errors {:?}", summary.errors);
}
