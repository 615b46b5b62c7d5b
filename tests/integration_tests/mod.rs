use fesdc::config::{LinearSolverConfig, MlsdcConfig, SdcConfig};

mod advection_diffusion;
mod heat_mlsdc;

fn accurate_solver() -> LinearSolverConfig {
    LinearSolverConfig {
        tolerance: 1e-12,
        max_iterations: 2000,
    }
}

fn heat_1d_config(num_elements: usize) -> SdcConfig {
    let mut config = SdcConfig::default();
    config.discretization.dim = 1;
    config.discretization.num_elements = num_elements;
    config.solver = accurate_solver();
    config
}

fn mlsdc_config_from(config: &SdcConfig) -> MlsdcConfig {
    MlsdcConfig {
        discretization: config.discretization.clone(),
        coarse: Default::default(),
        time: config.time.clone(),
        sweeper: config.sweeper.clone(),
        convergence: config.convergence.clone(),
        solver: config.solver.clone(),
        problem: config.problem.clone(),
    }
}
