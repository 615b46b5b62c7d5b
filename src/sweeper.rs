//! The IMEX-SDC sweeper of a single level.
//!
//! Node-indexed vectors use the index `0` for the initial value of the step at `τ = 0` and
//! `m = 1, ..., N` for the collocation nodes `τ_1 < ... < τ_N`. Quadrature matrices of
//! [`CollocationNodes`] are indexed from zero, so row `m - 1` belongs to node `m`.
use crate::config::{Predictor, SweeperConfig};
use crate::controller::Status;
use crate::error::SdcError;
use crate::fe_manager::{FeLevel, FeManager, LevelHandle};
use crate::splitting::{ImexSplitting, SolveOutcome};
use fesdc_quadrature::CollocationNodes;
use log::{info, warn};
use nalgebra::DVector;
use std::collections::BTreeMap;

/// Diagnostic values keyed by `(step, iteration)`.
pub type ErrorMap = BTreeMap<(usize, usize), f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperStage {
    Uninitialized,
    Initialized,
    Predicted,
    /// The number of sweeps performed since the last prediction.
    Swept(usize),
}

/// Values saved when a coarse level is overwritten by restricted fine values.
#[derive(Debug, Clone)]
struct Snapshot {
    u: Vec<DVector<f64>>,
    f_expl: Vec<DVector<f64>>,
    f_impl: Vec<DVector<f64>>,
}

#[derive(Debug, Clone)]
pub struct ImexSweeper<S> {
    splitting: S,
    level: LevelHandle,
    config: SweeperConfig,
    nodes: Option<CollocationNodes>,
    stage: SweeperStage,
    has_initial_value: bool,
    u: Vec<DVector<f64>>,
    f_expl: Vec<DVector<f64>>,
    f_impl: Vec<DVector<f64>>,
    /// Cumulative FAS correction, zero unless set by a transfer.
    tau: Vec<DVector<f64>>,
    snapshot: Option<Snapshot>,
    residuals: ErrorMap,
    errors: ErrorMap,
    solver_failures: BTreeMap<(usize, usize), usize>,
    num_f_expl_evals: usize,
}

impl<S: ImexSplitting> ImexSweeper<S> {
    pub fn new(splitting: S, level: LevelHandle, config: SweeperConfig) -> Self {
        Self {
            splitting,
            level,
            config,
            nodes: None,
            stage: SweeperStage::Uninitialized,
            has_initial_value: false,
            u: Vec::new(),
            f_expl: Vec::new(),
            f_impl: Vec::new(),
            tau: Vec::new(),
            snapshot: None,
            residuals: ErrorMap::new(),
            errors: ErrorMap::new(),
            solver_failures: BTreeMap::new(),
            num_f_expl_evals: 0,
        }
    }

    /// Builds the collocation nodes, assembles the level and allocates the node values.
    pub fn setup(&mut self, fe: &mut FeManager) -> Result<(), SdcError> {
        if self.stage != SweeperStage::Uninitialized {
            return Err(SdcError::invalid_state("sweeper has already been set up"));
        }
        let nodes = CollocationNodes::new(self.config.quadrature, self.config.num_nodes)?;
        fe.assemble(self.level)?;
        let num_dofs = fe.level(self.level)?.num_dofs();

        let zeros = vec![DVector::zeros(num_dofs); nodes.num_nodes() + 1];
        self.u = zeros.clone();
        self.f_expl = zeros.clone();
        self.f_impl = zeros.clone();
        self.tau = zeros;
        self.nodes = Some(nodes);
        self.stage = SweeperStage::Initialized;
        Ok(())
    }

    pub fn splitting(&self) -> &S {
        &self.splitting
    }

    pub fn level(&self) -> LevelHandle {
        self.level
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    pub fn stage(&self) -> SweeperStage {
        self.stage
    }

    pub fn collocation(&self) -> Result<&CollocationNodes, SdcError> {
        self.nodes
            .as_ref()
            .ok_or_else(|| SdcError::invalid_state("sweeper has not been set up"))
    }

    pub fn num_nodes(&self) -> usize {
        self.config.num_nodes
    }

    /// Node values, including the initial value at index zero.
    pub fn states(&self) -> &[DVector<f64>] {
        &self.u
    }

    pub fn f_expl_values(&self) -> &[DVector<f64>] {
        &self.f_expl
    }

    pub fn f_impl_values(&self) -> &[DVector<f64>] {
        &self.f_impl
    }

    pub fn tau(&self) -> &[DVector<f64>] {
        &self.tau
    }

    pub fn initial_value(&self) -> Result<&DVector<f64>, SdcError> {
        if !self.has_initial_value {
            return Err(SdcError::invalid_state("initial value has not been set"));
        }
        Ok(&self.u[0])
    }

    pub fn residuals(&self) -> &ErrorMap {
        &self.residuals
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    /// Number of linear solves that hit their iteration cap, per `(step, iteration)`.
    pub fn solver_failures(&self) -> &BTreeMap<(usize, usize), usize> {
        &self.solver_failures
    }

    pub fn total_solver_failures(&self) -> usize {
        self.solver_failures.values().sum()
    }

    /// Failed linear solves over all iterations of `step`, the predictor included.
    pub fn solver_failures_in_step(&self, step: usize) -> usize {
        self.solver_failures
            .range((step, 0)..=(step, usize::MAX))
            .map(|(_, &count)| count)
            .sum()
    }

    /// Forgets the residuals, errors, solver failures and evaluation count of earlier runs.
    pub(crate) fn clear_diagnostics(&mut self) {
        self.residuals.clear();
        self.errors.clear();
        self.solver_failures.clear();
        self.num_f_expl_evals = 0;
    }

    pub fn num_f_expl_evals(&self) -> usize {
        self.num_f_expl_evals
    }

    pub fn set_initial_value(&mut self, value: &DVector<f64>) -> Result<(), SdcError> {
        if self.stage == SweeperStage::Uninitialized {
            return Err(SdcError::invalid_state("initial value set before setup"));
        }
        SdcError::check_dimension(self.u[0].len(), value.len())?;
        self.u[0].copy_from(value);
        self.has_initial_value = true;
        self.stage = SweeperStage::Initialized;
        Ok(())
    }

    /// Computes a provisional solution at all nodes from the initial value.
    pub fn predict(&mut self, fe: &FeManager, status: &Status) -> Result<(), SdcError> {
        if self.stage == SweeperStage::Uninitialized {
            return Err(SdcError::invalid_state("predict called before setup"));
        }
        if !self.has_initial_value {
            return Err(SdcError::invalid_state("predict called without an initial value"));
        }
        let level = fe.level(self.level)?;
        let (taus, delta_taus) = self.node_positions()?;
        let (t0, dt, key) = (status.time(), status.dt(), status.key());

        self.evaluate_rhs(level, 0, t0, key)?;
        match self.config.predictor {
            Predictor::Spread => {
                for m in 1..self.u.len() {
                    self.u[m] = self.u[0].clone();
                    self.f_expl[m] = self.f_expl[0].clone();
                    self.f_impl[m] = self.f_impl[0].clone();
                }
            }
            Predictor::ImexEuler => {
                for m in 1..self.u.len() {
                    let c = dt * delta_taus[m - 1];
                    let t = t0 + dt * taus[m - 1];
                    let mut rhs = self.u[m - 1].clone();
                    rhs.axpy(c, &self.f_expl[m - 1], 1.0);
                    self.implicit_update(level, m, rhs, t, c, key)?;
                    self.evaluate_expl(level, m, t, key)?;
                }
            }
        }
        self.stage = SweeperStage::Predicted;
        Ok(())
    }

    /// Performs one IMEX-SDC correction sweep over all nodes.
    pub fn sweep(&mut self, fe: &FeManager, status: &Status) -> Result<(), SdcError> {
        let num_sweeps = match self.stage {
            SweeperStage::Predicted => 0,
            SweeperStage::Swept(k) => k,
            _ => return Err(SdcError::invalid_state("sweep called before predict")),
        };
        let level = fe.level(self.level)?;
        let (taus, delta_taus) = self.node_positions()?;
        let s_matrix = self.collocation()?.s_matrix().clone();
        let (t0, dt, key) = (status.time(), status.dt(), status.key());

        // Node-to-node integrals of the previous iterate
        let integrals: Vec<_> = (0..taus.len())
            .map(|m| self.integrate(s_matrix.row(m).iter().copied(), dt))
            .collect();
        let f_expl_old = self.f_expl.clone();

        for m in 1..self.u.len() {
            let c = dt * delta_taus[m - 1];
            let t = t0 + dt * taus[m - 1];
            let mut rhs = self.u[m - 1].clone();
            rhs.axpy(c, &self.f_expl[m - 1], 1.0);
            rhs.axpy(-c, &f_expl_old[m - 1], 1.0);
            rhs.axpy(-c, &self.f_impl[m], 1.0);
            rhs += &integrals[m - 1];
            rhs += &self.tau[m];
            rhs -= &self.tau[m - 1];
            self.implicit_update(level, m, rhs, t, c, key)?;
            self.evaluate_expl(level, m, t, key)?;
        }

        self.stage = SweeperStage::Swept(num_sweeps + 1);
        Ok(())
    }

    /// Residuals of the collocation problem at every node.
    ///
    /// `r_m = M (u_m - u_0 - dt Σ_j Q_mj F_j - τ_m)`, with `F = f_E + f_I`.
    pub fn residual(&self, fe: &FeManager, dt: f64, out: &mut Vec<DVector<f64>>) -> Result<(), SdcError> {
        let level = fe.level(self.level)?;
        let q_matrix = self.collocation()?.q_matrix();
        out.clear();
        for m in 1..self.u.len() {
            let mut defect = self.u[m].clone();
            defect -= &self.u[0];
            defect -= &self.integrate(q_matrix.row(m - 1).iter().copied(), dt);
            defect -= &self.tau[m];
            let mut residual = DVector::zeros(defect.len());
            self.splitting.residual(level, &defect, &mut residual)?;
            out.push(residual);
        }
        Ok(())
    }

    /// The maximum over all nodes of the max-norm of the residual.
    pub fn residual_norm(&self, fe: &FeManager, dt: f64) -> Result<f64, SdcError> {
        let mut residuals = Vec::new();
        self.residual(fe, dt, &mut residuals)?;
        Ok(residuals.iter().map(|r| r.amax()).fold(0.0, f64::max))
    }

    /// Like [`residual_norm`](Self::residual_norm), relative to the largest node value.
    pub fn relative_residual_norm(&self, fe: &FeManager, dt: f64) -> Result<f64, SdcError> {
        let residual = self.residual_norm(fe, dt)?;
        let scale = self.u[1..].iter().map(|u| u.amax()).fold(0.0, f64::max);
        Ok(if scale > 0.0 { residual / scale } else { residual })
    }

    /// The approximation at the end of the step.
    pub fn end_state(&self, dt: f64) -> Result<DVector<f64>, SdcError> {
        let nodes = self.collocation()?;
        if nodes.right_is_node() {
            Ok(self.u[nodes.num_nodes()].clone())
        } else {
            let mut end = self.u[0].clone();
            end += &self.integrate(nodes.weights().iter().copied(), dt);
            Ok(end)
        }
    }

    /// The reference solution at time `t` in the level's space, if the problem has one.
    pub fn exact(&self, fe: &FeManager, t: f64) -> Result<Option<DVector<f64>>, SdcError> {
        Ok(self.splitting.reference_solution(fe.level(self.level)?, t))
    }

    /// Records and logs the residual, and the error if a reference solution is known.
    ///
    /// Returns the residual norm.
    pub fn post_sweep(&mut self, fe: &FeManager, status: &Status) -> Result<f64, SdcError> {
        let dt = status.dt();
        let (step, iteration) = status.key();
        let residual = self.residual_norm(fe, dt)?;
        self.residuals.insert((step, iteration), residual);

        match self.exact(fe, status.time() + dt)? {
            Some(exact) => {
                let error = (self.end_state(dt)? - exact).amax();
                self.errors.insert((step, iteration), error);
                info!("step: {step}, iter: {iteration}, resid: {residual:e}, err: {error:e}");
            }
            None => info!("step: {step}, iter: {iteration}, resid: {residual:e}"),
        }
        Ok(residual)
    }

    /// Makes the end state of the current step the initial value of the next one.
    pub fn advance(&mut self, dt: f64) -> Result<(), SdcError> {
        if !matches!(self.stage, SweeperStage::Predicted | SweeperStage::Swept(_)) {
            return Err(SdcError::invalid_state("advance called before the step was computed"));
        }
        self.u[0] = self.end_state(dt)?;
        self.stage = SweeperStage::Initialized;
        Ok(())
    }

    /// `dt Σ_j Q_mj F_j` for all nodes `m`.
    pub fn integrals(&self, dt: f64) -> Result<Vec<DVector<f64>>, SdcError> {
        let q_matrix = self.collocation()?.q_matrix();
        Ok((0..q_matrix.nrows())
            .map(|m| self.integrate(q_matrix.row(m).iter().copied(), dt))
            .collect())
    }

    /// Replaces all node values and re-evaluates the right-hand sides.
    pub(crate) fn set_states(
        &mut self,
        fe: &FeManager,
        status: &Status,
        states: Vec<DVector<f64>>,
    ) -> Result<(), SdcError> {
        SdcError::check_dimension(self.u.len(), states.len())?;
        for (current, new) in self.u.iter().zip(&states) {
            SdcError::check_dimension(current.len(), new.len())?;
        }
        let level = fe.level(self.level)?;
        let (taus, _) = self.node_positions()?;
        let (t0, dt, key) = (status.time(), status.dt(), status.key());

        self.u = states;
        self.has_initial_value = true;
        for m in 0..self.u.len() {
            let t = if m == 0 { t0 } else { t0 + dt * taus[m - 1] };
            self.evaluate_rhs(level, m, t, key)?;
        }
        if self.stage == SweeperStage::Initialized {
            self.stage = SweeperStage::Predicted;
        }
        Ok(())
    }

    pub(crate) fn set_tau(&mut self, tau: Vec<DVector<f64>>) -> Result<(), SdcError> {
        SdcError::check_dimension(self.tau.len(), tau.len())?;
        self.tau = tau;
        Ok(())
    }

    pub(crate) fn save_snapshot(&mut self) {
        self.snapshot = Some(Snapshot {
            u: self.u.clone(),
            f_expl: self.f_expl.clone(),
            f_impl: self.f_impl.clone(),
        });
    }

    /// Changes of node values and right-hand sides since the last snapshot.
    pub(crate) fn corrections(&self) -> Result<[Vec<DVector<f64>>; 3], SdcError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| SdcError::invalid_state("no snapshot to compute corrections from"))?;
        let difference = |current: &[DVector<f64>], saved: &[DVector<f64>]| -> Vec<DVector<f64>> {
            current.iter().zip(saved).map(|(c, s)| c - s).collect()
        };
        Ok([
            difference(&self.u, &snapshot.u),
            difference(&self.f_expl, &snapshot.f_expl),
            difference(&self.f_impl, &snapshot.f_impl),
        ])
    }

    /// Adds corrections to the values at the nodes `m = 1, ..., N`.
    pub(crate) fn add_corrections(
        &mut self,
        du: &[DVector<f64>],
        df_expl: &[DVector<f64>],
        df_impl: &[DVector<f64>],
    ) -> Result<(), SdcError> {
        let num_nodes = self.u.len() - 1;
        for corrections in [du, df_expl, df_impl] {
            SdcError::check_dimension(num_nodes, corrections.len())?;
        }
        for m in 1..=num_nodes {
            self.u[m] += &du[m - 1];
            self.f_expl[m] += &df_expl[m - 1];
            self.f_impl[m] += &df_impl[m - 1];
        }
        Ok(())
    }

    fn node_positions(&self) -> Result<(Vec<f64>, Vec<f64>), SdcError> {
        let nodes = self.collocation()?;
        Ok((nodes.nodes().to_vec(), nodes.delta_nodes().to_vec()))
    }

    /// `dt Σ_j w_j F_j` over the nodes `j = 1, ..., N`.
    fn integrate(&self, weights: impl Iterator<Item = f64>, dt: f64) -> DVector<f64> {
        let mut sum = DVector::zeros(self.u[0].len());
        for (j, w) in weights.enumerate() {
            sum.axpy(dt * w, &self.f_expl[j + 1], 1.0);
            sum.axpy(dt * w, &self.f_impl[j + 1], 1.0);
        }
        sum
    }

    /// Sets `u_m` from `u_m - c f_I(u_m) = rhs`, and updates `f_I(u_m)`.
    fn implicit_update(
        &mut self,
        level: &FeLevel,
        m: usize,
        rhs: DVector<f64>,
        t: f64,
        c: f64,
        key: (usize, usize),
    ) -> Result<(), SdcError> {
        let outcome = if c == 0.0 {
            self.u[m] = rhs;
            self.splitting
                .f_impl_eval(level, &self.u[m], t, &mut self.f_impl[m])?
        } else {
            self.splitting
                .impl_solve(level, &rhs, t, c, &mut self.u[m], &mut self.f_impl[m])?
        };
        self.record_solve(outcome, key);
        Ok(())
    }

    fn evaluate_expl(&mut self, level: &FeLevel, m: usize, t: f64, key: (usize, usize)) -> Result<(), SdcError> {
        let outcome = self
            .splitting
            .f_expl_eval(level, &self.u[m], t, &mut self.f_expl[m])?;
        self.num_f_expl_evals += 1;
        self.record_solve(outcome, key);
        Ok(())
    }

    fn evaluate_rhs(&mut self, level: &FeLevel, m: usize, t: f64, key: (usize, usize)) -> Result<(), SdcError> {
        self.evaluate_expl(level, m, t, key)?;
        let outcome = self
            .splitting
            .f_impl_eval(level, &self.u[m], t, &mut self.f_impl[m])?;
        self.record_solve(outcome, key);
        Ok(())
    }

    fn record_solve(&mut self, outcome: SolveOutcome, key: (usize, usize)) {
        if !outcome.converged {
            *self.solver_failures.entry(key).or_insert(0) += 1;
            warn!(
                "Linear solve did not converge in step {}, iteration {}: {} iterations, residual {:.3e}",
                key.0, key.1, outcome.iterations, outcome.residual_norm
            );
        }
    }
}
