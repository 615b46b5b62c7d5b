use fesdc::config::SdcConfig;
use fesdc::splitting::sine_product;
use fesdc::Sdc;

#[test]
fn advection_diffusion_2d_converges_and_decays() {
    let mut config = SdcConfig::default();
    config.problem.nu = 0.05;
    config.problem.velocity = Some(vec![1.0, 0.5]);
    config.time.dt = 0.01;
    config.time.t_end = Some(0.05);
    config.convergence.max_iterations = 20;
    let mut sdc = Sdc::advection_diffusion(config).unwrap();
    sdc.setup().unwrap();

    let space = sdc.fe().level(sdc.sweeper().level()).unwrap().space().clone();
    let u0 = space.interpolate(sine_product);
    sdc.set_initial_value(&u0).unwrap();
    let report = sdc.run().unwrap();
    sdc.post_run().unwrap();

    assert_eq!(report.steps.len(), 5);
    let residuals = sdc.sweeper().residuals();
    for step in 0..5 {
        let predictor = residuals[&(step, 0)];
        let last = residuals[&(step, 20)];
        assert!(last.is_finite());
        assert!(last <= 1e-3 * predictor, "step {step}: {predictor:e} -> {last:e}");
    }
    let u = sdc.end_state().unwrap();
    assert!(u.iter().all(|x| x.is_finite()));
    // Homogeneous Dirichlet conditions and diffusion damp the solution
    assert!(u.amax() < u0.amax());
    for &dof in sdc.fe().level(sdc.sweeper().level()).unwrap().boundary_dofs() {
        assert!(u[dof].abs() <= 1e-12);
    }
    assert!(sdc.sweeper().num_f_expl_evals() > 0);
}

#[test]
fn zero_velocity_reduces_to_heat() {
    let mut heat_config = SdcConfig::default();
    heat_config.discretization.dim = 1;
    heat_config.discretization.num_elements = 32;
    heat_config.solver.tolerance = 1e-12;
    let mut advection_config = heat_config.clone();
    advection_config.problem.velocity = Some(vec![0.0]);

    let mut heat = Sdc::heat(heat_config).unwrap();
    heat.setup().unwrap();
    heat.set_initial_value_from_exact().unwrap();
    heat.run().unwrap();

    let mut advection = Sdc::advection_diffusion(advection_config).unwrap();
    advection.setup().unwrap();
    let space = advection.fe().level(advection.sweeper().level()).unwrap().space().clone();
    advection.set_initial_value(&space.interpolate(sine_product)).unwrap();
    advection.run().unwrap();

    let difference = (heat.end_state().unwrap() - advection.end_state().unwrap()).amax();
    assert!(difference <= 1e-9, "difference {difference:e}");
}
