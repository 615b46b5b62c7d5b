//! Single-level SDC.
use crate::config::{SdcConfig, TimeInterval};
use crate::controller::{residual_converged, Controller, RunReport, Status, StepReport};
use crate::error::SdcError;
use crate::fe_manager::FeManager;
use crate::splitting::{AdvectionDiffusion, Heat, ImexSplitting};
use crate::sweeper::ImexSweeper;
use log::{info, warn};
use nalgebra::DVector;

/// Integrates a single level with IMEX-SDC, one step after the other.
#[derive(Debug)]
pub struct Sdc<S> {
    config: SdcConfig,
    interval: TimeInterval,
    fe: FeManager,
    sweeper: ImexSweeper<S>,
    status: Status,
    is_set_up: bool,
    /// Initial value every run starts from.
    initial: Option<DVector<f64>>,
    report: Option<RunReport>,
}

impl<S: ImexSplitting> Sdc<S> {
    /// Validates the configuration and takes ownership of the level and its sweeper.
    ///
    /// No operators are assembled until [`setup`](Self::setup).
    pub fn new(config: SdcConfig, fe: FeManager, sweeper: ImexSweeper<S>) -> Result<Self, SdcError> {
        let interval = config.validate()?;
        let status = Status::new(&interval, config.convergence.max_iterations);
        Ok(Self {
            config,
            interval,
            fe,
            sweeper,
            status,
            is_set_up: false,
            initial: None,
            report: None,
        })
    }

    pub fn config(&self) -> &SdcConfig {
        &self.config
    }

    pub fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    pub fn fe(&self) -> &FeManager {
        &self.fe
    }

    pub fn sweeper(&self) -> &ImexSweeper<S> {
        &self.sweeper
    }

    pub fn sweeper_mut(&mut self) -> &mut ImexSweeper<S> {
        &mut self.sweeper
    }

    /// The report of the last completed run.
    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    pub fn setup(&mut self) -> Result<(), SdcError> {
        self.sweeper.setup(&mut self.fe)?;
        self.is_set_up = true;
        Ok(())
    }

    pub fn set_initial_value(&mut self, value: &DVector<f64>) -> Result<(), SdcError> {
        self.sweeper.set_initial_value(value)?;
        self.initial = Some(value.clone());
        Ok(())
    }

    /// Uses the reference solution at the start time as initial value.
    pub fn set_initial_value_from_exact(&mut self) -> Result<(), SdcError> {
        let initial = self
            .sweeper
            .exact(&self.fe, self.interval.t0)?
            .ok_or_else(|| SdcError::configuration("the problem has no reference solution"))?;
        self.set_initial_value(&initial)
    }

    /// The approximation at the end of the last computed step.
    pub fn end_state(&self) -> Result<DVector<f64>, SdcError> {
        if self.report.is_none() {
            return Err(SdcError::invalid_state("no run has been completed"));
        }
        self.sweeper.end_state(self.interval.dt)
    }

    /// Integrates all steps from the initial value.
    ///
    /// Repeated runs start from the same initial value and give the same result.
    pub fn run(&mut self) -> Result<RunReport, SdcError> {
        if !self.is_set_up {
            return Err(SdcError::invalid_state("run called before setup"));
        }
        let initial = match self.initial.take() {
            Some(initial) => initial,
            None => self.sweeper.initial_value()?.clone(),
        };
        self.sweeper.set_initial_value(&initial)?;
        self.initial = Some(initial);
        self.sweeper.clear_diagnostics();

        let dt = self.interval.dt;
        let convergence = &self.config.convergence;
        let max_iterations = convergence.max_iterations;
        let mut report = RunReport::default();

        for step in 0..self.interval.num_steps {
            self.status.begin_step(step);
            if step > 0 {
                self.sweeper.advance(dt)?;
            }
            self.sweeper.predict(&self.fe, &self.status)?;
            let mut residual = self.sweeper.post_sweep(&self.fe, &self.status)?;

            let mut iterations = 0;
            let mut residual_met = false;
            for k in 1..=max_iterations {
                self.status.set_iteration(k);
                self.sweeper.sweep(&self.fe, &self.status)?;
                residual = self.sweeper.post_sweep(&self.fe, &self.status)?;
                iterations = k;

                let relative = if convergence.rel_residual_tol > 0.0 {
                    self.sweeper.relative_residual_norm(&self.fe, dt)?
                } else {
                    residual
                };
                // The residual of a sweep with inexact solves is not trusted
                let sweep_failed = self.sweeper.solver_failures().contains_key(&(step, k));
                if !sweep_failed && residual_converged(convergence, residual, relative) {
                    residual_met = true;
                    break;
                }
            }

            let solver_failures = self.sweeper.solver_failures_in_step(step);
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
            "Finished {} steps with {} sweeps, final residual {:e}",
            report.steps.len(),
            report.total_iterations(),
            report.final_residual().unwrap_or(f64::NAN)
        );
        if let Some(exact) = self.sweeper.exact(&self.fe, self.status.time())? {
            let error = (self.sweeper.end_state(self.interval.dt)? - exact).amax();
            info!("Error at t = {}: {error:e}", self.status.time());
        }
        let failures = self.sweeper.total_solver_failures();
        if failures > 0 {
            warn!("{failures} linear solves did not reach their tolerance");
        }
        Ok(())
    }
}

impl<S: ImexSplitting> Controller for Sdc<S> {
    fn setup(&mut self) -> Result<(), SdcError> {
        Sdc::setup(self)
    }

    fn run(&mut self) -> Result<RunReport, SdcError> {
        Sdc::run(self)
    }

    fn post_run(&mut self) -> Result<(), SdcError> {
        Sdc::post_run(self)
    }

    fn status(&self) -> &Status {
        &self.status
    }
}

impl Sdc<Heat> {
    /// Builds an SDC run of the heat equation from a configuration alone.
    pub fn heat(config: SdcConfig) -> Result<Self, SdcError> {
        config.validate()?;
        let mut fe = FeManager::new();
        let level = fe.add_level(config.discretization.build_space()?);
        let heat = Heat::new(config.problem.nu, config.solver.clone());
        let sweeper = ImexSweeper::new(heat, level, config.sweeper.clone());
        Self::new(config, fe, sweeper)
    }
}

impl Sdc<AdvectionDiffusion> {
    /// Builds an SDC run of advection-diffusion from a configuration alone.
    ///
    /// Defaults to unit velocity along every axis.
    pub fn advection_diffusion(config: SdcConfig) -> Result<Self, SdcError> {
        config.validate()?;
        let mut fe = FeManager::new();
        let level = fe.add_level(config.discretization.build_space()?);
        let velocity = config
            .problem
            .velocity
            .clone()
            .unwrap_or_else(|| vec![1.0; config.discretization.dim]);
        let problem = AdvectionDiffusion::new(config.problem.nu, velocity, config.solver.clone());
        let sweeper = ImexSweeper::new(problem, level, config.sweeper.clone());
        Self::new(config, fe, sweeper)
    }
}
