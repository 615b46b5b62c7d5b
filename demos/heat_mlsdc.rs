//! Solves the heat equation with two-level MLSDC.
//!
//! Usage: `cargo run --release --example heat_mlsdc [config.json]`.
use eyre::WrapErr;
use fesdc::estimate::estimate_L2_error;
use fesdc::{Controller, MlsdcConfig, TwoLevelMlsdc};

fn main() -> eyre::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => MlsdcConfig::from_json_file(&path).wrap_err_with(|| format!("failed to read {path}"))?,
        None => MlsdcConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);

    let mut mlsdc = TwoLevelMlsdc::heat(config)?;
    mlsdc.setup()?;
    mlsdc.set_initial_value_from_exact()?;
    let report = mlsdc.run()?;
    mlsdc.post_run()?;

    let t_end = mlsdc.status().time();
    let u_h = mlsdc.end_state()?;
    let space = mlsdc.fe().level(mlsdc.fine().level())?.space();
    let heat = mlsdc.fine().splitting();
    let l2_error = estimate_L2_error(space, |x| heat.exact_solution(x, t_end), &u_h)?;

    println!(
        "{} steps, {} fine sweeps, all converged: {}",
        report.steps.len(),
        report.total_iterations(),
        report.all_converged()
    );
    if let Some(residual) = report.final_residual() {
        println!("Final residual: {residual:.3e}");
    }
    println!("L2 error at t = {t_end}: {l2_error:.3e}");
    Ok(())
}
