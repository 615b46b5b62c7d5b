//! Two-level multi-level SDC with FAS corrections.
use crate::config::{MlsdcConfig, TimeInterval};
use crate::controller::{residual_converged, Controller, RunReport, Status, StepReport};
use crate::error::SdcError;
use crate::fe_manager::FeManager;
use crate::splitting::{Heat, ImexSplitting};
use crate::sweeper::ImexSweeper;
use crate::transfer::SpectralTransfer;
use log::{debug, info, log_enabled, warn, Level};
use nalgebra::DVector;

/// Integrates with two levels, one coarse sweep per fine sweep.
///
/// Each iteration sweeps the FAS-corrected coarse level, interpolates its correction to the
/// fine level and then sweeps the fine level. Convergence is decided on the fine residual.
#[derive(Debug)]
pub struct TwoLevelMlsdc<C, F> {
    config: MlsdcConfig,
    interval: TimeInterval,
    fe: FeManager,
    coarse: ImexSweeper<C>,
    fine: ImexSweeper<F>,
    transfer: Option<SpectralTransfer>,
    status: Status,
    /// Fine initial value every run starts from.
    initial: Option<DVector<f64>>,
    report: Option<RunReport>,
}

impl<C, F> TwoLevelMlsdc<C, F>
where
    C: ImexSplitting,
    F: ImexSplitting,
{
    pub fn new(
        config: MlsdcConfig,
        fe: FeManager,
        coarse: ImexSweeper<C>,
        fine: ImexSweeper<F>,
    ) -> Result<Self, SdcError> {
        let interval = config.validate()?;
        if coarse.level() == fine.level() {
            return Err(SdcError::configuration("coarse and fine sweepers share a level"));
        }
        let status = Status::new(&interval, config.convergence.max_iterations);
        Ok(Self {
            config,
            interval,
            fe,
            coarse,
            fine,
            transfer: None,
            status,
            initial: None,
            report: None,
        })
    }

    pub fn config(&self) -> &MlsdcConfig {
        &self.config
    }

    pub fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    pub fn fe(&self) -> &FeManager {
        &self.fe
    }

    pub fn coarse(&self) -> &ImexSweeper<C> {
        &self.coarse
    }

    pub fn fine(&self) -> &ImexSweeper<F> {
        &self.fine
    }

    pub fn fine_mut(&mut self) -> &mut ImexSweeper<F> {
        &mut self.fine
    }

    pub fn transfer(&self) -> Result<&SpectralTransfer, SdcError> {
        self.transfer
            .as_ref()
            .ok_or_else(|| SdcError::invalid_state("transfer requested before setup"))
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    /// Sets up both levels and the transfer between them.
    ///
    /// Fails with a configuration error if the coarse collocation nodes are not fine nodes.
    pub fn setup(&mut self) -> Result<(), SdcError> {
        self.coarse.setup(&mut self.fe)?;
        self.fine.setup(&mut self.fe)?;
        self.transfer = Some(SpectralTransfer::create(&self.fe, &self.coarse, &self.fine)?);
        Ok(())
    }

    /// Sets the fine initial value. The coarse one is derived by restriction in every step.
    pub fn set_initial_value(&mut self, value: &DVector<f64>) -> Result<(), SdcError> {
        self.fine.set_initial_value(value)?;
        self.initial = Some(value.clone());
        Ok(())
    }

    pub fn set_initial_value_from_exact(&mut self) -> Result<(), SdcError> {
        let initial = self
            .fine
            .exact(&self.fe, self.interval.t0)?
            .ok_or_else(|| SdcError::configuration("the problem has no reference solution"))?;
        self.set_initial_value(&initial)
    }

    /// The fine approximation at the end of the last computed step.
    pub fn end_state(&self) -> Result<DVector<f64>, SdcError> {
        if self.report.is_none() {
            return Err(SdcError::invalid_state("no run has been completed"));
        }
        self.fine.end_state(self.interval.dt)
    }

    /// Integrates all steps from the fine initial value.
    ///
    /// Repeated runs start from the same initial value and give the same result.
    pub fn run(&mut self) -> Result<RunReport, SdcError> {
        let transfer = self
            .transfer
            .as_ref()
            .ok_or_else(|| SdcError::invalid_state("run called before setup"))?;
        let initial = match self.initial.take() {
            Some(initial) => initial,
            None => self.fine.initial_value()?.clone(),
        };
        self.fine.set_initial_value(&initial)?;
        self.initial = Some(initial);
        self.coarse.clear_diagnostics();
        self.fine.clear_diagnostics();

        let dt = self.interval.dt;
        let convergence = &self.config.convergence;
        let max_iterations = convergence.max_iterations;
        let mut report = RunReport::default();

        for step in 0..self.interval.num_steps {
            self.status.begin_step(step);
            if step > 0 {
                self.fine.advance(dt)?;
            }
            transfer.restrict_initial(&self.fine, &mut self.coarse)?;
            self.coarse.predict(&self.fe, &self.status)?;
            self.fine.predict(&self.fe, &self.status)?;
            let mut residual = self.fine.post_sweep(&self.fe, &self.status)?;

            let mut iterations = 0;
            let mut residual_met = false;
            for k in 1..=max_iterations {
                self.status.set_iteration(k);

                transfer.restrict_states(&self.fe, &self.status, &self.fine, &mut self.coarse)?;
                transfer.fas(&self.status, &self.fine, &mut self.coarse)?;
                self.coarse.sweep(&self.fe, &self.status)?;
                if log_enabled!(Level::Debug) {
                    let coarse_residual = self.coarse.residual_norm(&self.fe, dt)?;
                    debug!("step: {step}, iter: {k}, coarse resid: {coarse_residual:e}");
                }
                transfer.interpolate_correction(&self.coarse, &mut self.fine)?;

                self.fine.sweep(&self.fe, &self.status)?;
                residual = self.fine.post_sweep(&self.fe, &self.status)?;
                iterations = k;

                let relative = if convergence.rel_residual_tol > 0.0 {
                    self.fine.relative_residual_norm(&self.fe, dt)?
                } else {
                    residual
                };
                let sweep_failed = self.coarse.solver_failures().contains_key(&(step, k))
                    || self.fine.solver_failures().contains_key(&(step, k));
                if !sweep_failed && residual_converged(convergence, residual, relative) {
                    residual_met = true;
                    break;
                }
            }

            let solver_failures =
                self.coarse.solver_failures_in_step(step) + self.fine.solver_failures_in_step(step);
            let converged = residual_met && solver_failures == 0;
            if !converged {
                warn!(
                    "step {step} did not converge in {iterations} iterations, residual {residual:e}, \
                     {solver_failures} failed linear solves"
                );
            }
            report.steps.push(StepReport {
                step,
                time: self.status.time() + dt,
                iterations,
                residual,
                solver_failures,
                converged,
            });
        }

        self.status.finish();
        self.report = Some(report.clone());
        Ok(report)
    }

    pub fn post_run(&mut self) -> Result<(), SdcError> {
        let report = self
            .report
            .as_ref()
            .ok_or_else(|| SdcError::invalid_state("post_run called before run"))?;
        info!(
            "Finished {} steps with {} fine sweeps, final residual {:e}",
            report.steps.len(),
            report.total_iterations(),
            report.final_residual().unwrap_or(f64::NAN)
        );
        if let Some(exact) = self.fine.exact(&self.fe, self.status.time())? {
            let error = (self.fine.end_state(self.interval.dt)? - exact).amax();
            info!("Error at t = {}: {error:e}", self.status.time());
        }
        let failures = self.coarse.total_solver_failures() + self.fine.total_solver_failures();
        if failures > 0 {
            warn!("{failures} linear solves did not reach their tolerance");
        }
        Ok(())
    }
}

impl<C, F> Controller for TwoLevelMlsdc<C, F>
where
    C: ImexSplitting,
    F: ImexSplitting,
{
    fn setup(&mut self) -> Result<(), SdcError> {
        TwoLevelMlsdc::setup(self)
    }

    fn run(&mut self) -> Result<RunReport, SdcError> {
        TwoLevelMlsdc::run(self)
    }

    fn post_run(&mut self) -> Result<(), SdcError> {
        TwoLevelMlsdc::post_run(self)
    }

    fn status(&self) -> &Status {
        &self.status
    }
}

impl TwoLevelMlsdc<Heat, Heat> {
    /// Builds a two-level run of the heat equation from a configuration alone.
    pub fn heat(config: MlsdcConfig) -> Result<Self, SdcError> {
        config.validate()?;
        let mut fe = FeManager::new();
        let coarse_level = fe.add_level(config.coarse_discretization()?.build_space()?);
        let fine_level = fe.add_level(config.discretization.build_space()?);
        let coarse = ImexSweeper::new(
            Heat::new(config.problem.nu, config.solver.clone()),
            coarse_level,
            config.coarse_sweeper(),
        );
        let fine = ImexSweeper::new(
            Heat::new(config.problem.nu, config.solver.clone()),
            fine_level,
            config.sweeper.clone(),
        );
        Self::new(config, fe, coarse, fine)
    }
}
