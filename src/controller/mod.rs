//! Controllers driving sweepers through the time steps of a run.
use crate::config::ConvergenceConfig;
use crate::error::SdcError;

pub mod mlsdc;
pub mod sdc;
mod status;

pub use mlsdc::TwoLevelMlsdc;
pub use sdc::Sdc;
pub use status::Status;

/// Common interface of time integration controllers.
///
/// A controller owns its levels and is the only writer of its [`Status`].
pub trait Controller {
    /// Assembles operators and allocates all state. Must be called before [`run`](Self::run).
    fn setup(&mut self) -> Result<(), SdcError>;

    /// Integrates over all time steps, starting from the initial value set by the caller.
    fn run(&mut self) -> Result<RunReport, SdcError>;

    /// Reports end-of-run diagnostics.
    fn post_run(&mut self) -> Result<(), SdcError>;

    fn status(&self) -> &Status;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: usize,
    /// Time at the end of the step.
    pub time: f64,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Residual norm after the last sweep.
    pub residual: f64,
    /// Linear solves of the step that stopped at their iteration cap.
    pub solver_failures: usize,
    pub converged: bool,
}

/// Outcome of a run, one entry per time step.
///
/// Steps that exhausted the iteration budget without meeting the residual tolerance are
/// reported as not converged, as are steps in which a linear solve stopped at its iteration
/// cap. They do not abort the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn all_converged(&self) -> bool {
        self.steps.iter().all(|step| step.converged)
    }

    pub fn final_residual(&self) -> Option<f64> {
        self.steps.last().map(|step| step.residual)
    }

    pub fn total_iterations(&self) -> usize {
        self.steps.iter().map(|step| step.iterations).sum()
    }
}

/// Whether a residual satisfies the absolute or the relative tolerance.
///
/// Tolerances of zero are disabled, so with both disabled this is never true and the
/// iteration runs until its budget is exhausted.
pub(crate) fn residual_converged(config: &ConvergenceConfig, residual: f64, relative_residual: f64) -> bool {
    let abs = config.abs_residual_tol > 0.0 && residual <= config.abs_residual_tol;
    let rel = config.rel_residual_tol > 0.0 && relative_residual <= config.rel_residual_tol;
    abs || rel
}
