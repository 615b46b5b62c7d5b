//! Solves the heat equation with single-level IMEX-SDC.
//!
//! Usage: `cargo run --release --example heat_sdc [config.json]`. Without a configuration
//! file the default 2D setup is used.
use eyre::WrapErr;
use fesdc::estimate::estimate_L2_error;
use fesdc::{Controller, Sdc, SdcConfig};

fn main() -> eyre::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => SdcConfig::from_json_file(&path).wrap_err_with(|| format!("failed to read {path}"))?,
        None => SdcConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);

    let mut sdc = Sdc::heat(config)?;
    sdc.setup()?;
    sdc.set_initial_value_from_exact()?;
    let report = sdc.run()?;
    sdc.post_run()?;

    let t_end = sdc.status().time();
    let u_h = sdc.end_state()?;
    let space = sdc.fe().level(sdc.sweeper().level())?.space();
    let heat = sdc.sweeper().splitting();
    let nodal_error = (&u_h - space.interpolate(|x| heat.exact_solution(x, t_end))).amax();
    let l2_error = estimate_L2_error(space, |x| heat.exact_solution(x, t_end), &u_h)?;

    for step in &report.steps {
        println!(
            "step {:>4}  t = {:.4}  iterations = {:>2}  residual = {:.3e}{}",
            step.step,
            step.time,
            step.iterations,
            step.residual,
            if step.converged { "" } else { "  (not converged)" }
        );
    }
    println!("Nodal max error at t = {t_end}: {nodal_error:.3e}");
    println!("L2 error at t = {t_end}: {l2_error:.3e}");
    Ok(())
}
