//! Implicit-explicit splittings of the model equations.
//!
//! A splitting provides the two right-hand side parts `f_E` (treated explicitly) and `f_I`
//! (treated implicitly) of the semi-discrete system `M u' = ...`, the implicit solve, and the
//! mass-weighted residual. State vectors hold nodal values of the level's [`LagrangeSpace`].
//!
//! [`LagrangeSpace`]: crate::space::LagrangeSpace
use crate::config::LinearSolverConfig;
use crate::error::SdcError;
use crate::fe_manager::FeLevel;
use fesdc_sparse::cg::{CgOutcome, CgSettings, PcgSolver};
use fesdc_sparse::ilu::Ilu0;
use fesdc_sparse::ops::{add_scaled, csr_mul_vector, linear_combination, spmv_csr};
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::f64::consts::PI;

/// Statistics of a linear solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    pub iterations: usize,
    pub residual_norm: f64,
    /// `false` if the iteration cap was reached before the tolerance.
    pub converged: bool,
}

impl From<CgOutcome<f64>> for SolveOutcome {
    fn from(outcome: CgOutcome<f64>) -> Self {
        Self {
            iterations: outcome.iterations,
            residual_norm: outcome.residual_norm,
            converged: outcome.converged,
        }
    }
}

impl SolveOutcome {
    /// Outcome of an evaluation that required no iterative solve.
    pub fn direct() -> Self {
        Self {
            iterations: 0,
            residual_norm: 0.0,
            converged: true,
        }
    }
}

pub trait ImexSplitting {
    /// Evaluates the explicit part `f_E(u, t)`.
    fn f_expl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        t: f64,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError>;

    /// Evaluates the implicit part `f_I(u, t)`.
    fn f_impl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        t: f64,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError>;

    /// Solves `u - c f_I(u, t) = rhs` for `u` with `c > 0` and stores `f_I(u, t)` in `f_impl`.
    fn impl_solve(
        &mut self,
        level: &FeLevel,
        rhs: &DVector<f64>,
        t: f64,
        c: f64,
        u: &mut DVector<f64>,
        f_impl: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError>;

    /// Maps a nodal defect to the (mass-weighted) collocation residual.
    fn residual(&self, level: &FeLevel, defect: &DVector<f64>, residual: &mut DVector<f64>) -> Result<(), SdcError>;

    /// Analytical solution at time `t`, if known.
    fn reference_solution(&self, _level: &FeLevel, _t: f64) -> Option<DVector<f64>> {
        None
    }
}

#[derive(Debug, Clone)]
struct ImplicitSystem {
    matrix: CsrMatrix<f64>,
    preconditioner: Ilu0<f64>,
}

fn cached_ilu<'a>(slot: &'a mut Option<Ilu0<f64>>, matrix: &CsrMatrix<f64>) -> Result<&'a Ilu0<f64>, SdcError> {
    let ilu = match slot.take() {
        Some(ilu) => ilu,
        None => Ilu0::factor(matrix)?,
    };
    Ok(&*slot.insert(ilu))
}

/// Solves the SPD system `A x = b` with preconditioned CG, using `x` as initial guess.
fn solve_spd(
    solver: &mut PcgSolver<f64>,
    matrix: &CsrMatrix<f64>,
    preconditioner: &Ilu0<f64>,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
) -> Result<SolveOutcome, SdcError> {
    let outcome = solver.solve(matrix, preconditioner, DVectorView::from(b), DVectorViewMut::from(x))?;
    debug!(
        "CG stopped after {} iterations, residual {:.3e}, converged: {}",
        outcome.iterations, outcome.residual_norm, outcome.converged
    );
    Ok(SolveOutcome::from(outcome))
}

/// The diffusion operator `f_I = -ν M⁻¹ A u` with its implicit solves.
///
/// Factorizations of `M` and of `M + c ν A` are cached, keyed by the exact bit pattern of
/// `c`. Since the sweeper only ever uses the values `dt Δτ_m`, the cache stays small.
#[derive(Debug, Clone)]
pub struct FeDiffusion {
    nu: f64,
    solver: LinearSolverConfig,
    mass_preconditioner: Option<Ilu0<f64>>,
    implicit_systems: FxHashMap<u64, ImplicitSystem>,
    cg: PcgSolver<f64>,
}

impl FeDiffusion {
    pub fn new(nu: f64, solver: LinearSolverConfig) -> Self {
        let cg = PcgSolver::new(CgSettings::new(solver.tolerance, solver.max_iterations));
        Self {
            nu,
            solver,
            mass_preconditioner: None,
            implicit_systems: FxHashMap::default(),
            cg,
        }
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }

    pub fn solver_config(&self) -> &LinearSolverConfig {
        &self.solver
    }

    pub fn num_cached_systems(&self) -> usize {
        self.implicit_systems.len()
    }

    /// Solves `M x = b`, starting from a zero initial guess.
    pub fn solve_mass(
        &mut self,
        mass: &CsrMatrix<f64>,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        let preconditioner = cached_ilu(&mut self.mass_preconditioner, mass)?;
        x.fill(0.0);
        solve_spd(&mut self.cg, mass, preconditioner, b, x)
    }

    pub fn f_impl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        let operators = level.operators()?;
        SdcError::check_dimension(level.num_dofs(), u.len())?;
        let mut rhs = csr_mul_vector(&operators.stiffness, u);
        rhs *= -self.nu;
        self.solve_mass(&operators.mass, &rhs, f)
    }

    pub fn impl_solve(
        &mut self,
        level: &FeLevel,
        rhs: &DVector<f64>,
        c: f64,
        u: &mut DVector<f64>,
        f_impl: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        if !(c > 0.0) {
            return Err(SdcError::invalid_state(format!(
                "implicit solve requires a positive step, got {c}"
            )));
        }
        let operators = level.operators()?;
        SdcError::check_dimension(level.num_dofs(), rhs.len())?;

        let system = match self.implicit_systems.entry(c.to_bits()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let matrix = add_scaled(&operators.mass, c * self.nu, &operators.stiffness)?;
                let preconditioner = Ilu0::factor(&matrix)?;
                debug!("Factorized implicit system for c = {c:.6e}");
                entry.insert(ImplicitSystem { matrix, preconditioner })
            }
        };

        // (M + c ν A) u = M rhs
        let b = csr_mul_vector(&operators.mass, rhs);
        u.copy_from(rhs);
        let outcome = solve_spd(&mut self.cg, &system.matrix, &system.preconditioner, &b, u)?;

        // f_I = (u - rhs) / c
        f_impl.copy_from(u);
        *f_impl -= rhs;
        *f_impl /= c;
        Ok(outcome)
    }

    pub fn residual(
        &self,
        level: &FeLevel,
        defect: &DVector<f64>,
        residual: &mut DVector<f64>,
    ) -> Result<(), SdcError> {
        let operators = level.operators()?;
        SdcError::check_dimension(level.num_dofs(), defect.len())?;
        SdcError::check_dimension(level.num_dofs(), residual.len())?;
        spmv_csr(
            0.0,
            DVectorViewMut::from(residual),
            1.0,
            &operators.mass,
            DVectorView::from(defect),
        );
        Ok(())
    }
}

/// The product of sines `∏ sin(π x_i)` that the heat equation damps uniformly.
pub fn sine_product(x: &[f64]) -> f64 {
    x.iter().map(|&x_i| (PI * x_i).sin()).product()
}

/// The heat equation `u_t = ν Δu` with homogeneous Dirichlet conditions.
///
/// All of the right-hand side is treated implicitly.
#[derive(Debug, Clone)]
pub struct Heat {
    diffusion: FeDiffusion,
}

impl Heat {
    pub fn new(nu: f64, solver: LinearSolverConfig) -> Self {
        Self {
            diffusion: FeDiffusion::new(nu, solver),
        }
    }

    pub fn diffusion(&self) -> &FeDiffusion {
        &self.diffusion
    }

    /// `∏ sin(π x_i) exp(-t d π² ν)` on the unit hypercube of dimension `d`.
    pub fn exact_solution(&self, x: &[f64], t: f64) -> f64 {
        let d = x.len() as f64;
        sine_product(x) * (-t * d * PI * PI * self.diffusion.nu()).exp()
    }
}

impl ImexSplitting for Heat {
    fn f_expl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        _t: f64,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        SdcError::check_dimension(level.num_dofs(), u.len())?;
        f.fill(0.0);
        Ok(SolveOutcome::direct())
    }

    fn f_impl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        _t: f64,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        self.diffusion.f_impl_eval(level, u, f)
    }

    fn impl_solve(
        &mut self,
        level: &FeLevel,
        rhs: &DVector<f64>,
        _t: f64,
        c: f64,
        u: &mut DVector<f64>,
        f_impl: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        self.diffusion.impl_solve(level, rhs, c, u, f_impl)
    }

    fn residual(&self, level: &FeLevel, defect: &DVector<f64>, residual: &mut DVector<f64>) -> Result<(), SdcError> {
        self.diffusion.residual(level, defect, residual)
    }

    fn reference_solution(&self, level: &FeLevel, t: f64) -> Option<DVector<f64>> {
        Some(level.space().interpolate(|x| self.exact_solution(x, t)))
    }
}

/// The advection-diffusion equation `u_t + v · ∇u = ν Δu` with constant velocity `v`.
///
/// Advection is treated explicitly, `f_E = -M⁻¹ C u` with `C = Σ_i v_i D_i`, and diffusion
/// implicitly.
#[derive(Debug, Clone)]
pub struct AdvectionDiffusion {
    diffusion: FeDiffusion,
    velocity: Vec<f64>,
    convection: Option<CsrMatrix<f64>>,
}

impl AdvectionDiffusion {
    pub fn new(nu: f64, velocity: Vec<f64>, solver: LinearSolverConfig) -> Self {
        Self {
            diffusion: FeDiffusion::new(nu, solver),
            velocity,
            convection: None,
        }
    }

    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    fn convection_matrix(&mut self, level: &FeLevel) -> Result<&CsrMatrix<f64>, SdcError> {
        let convection = match self.convection.take() {
            Some(convection) => convection,
            None => {
                let operators = level.operators()?;
                SdcError::check_dimension(operators.gradients.len(), self.velocity.len())?;
                let terms = self.velocity.iter().copied().zip(&operators.gradients);
                match linear_combination(terms)? {
                    Some(convection) => convection,
                    None => return Err(SdcError::configuration("advection velocity must not be empty")),
                }
            }
        };
        Ok(&*self.convection.insert(convection))
    }
}

impl ImexSplitting for AdvectionDiffusion {
    fn f_expl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        _t: f64,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        SdcError::check_dimension(level.num_dofs(), u.len())?;
        let mut rhs = csr_mul_vector(self.convection_matrix(level)?, u);
        rhs *= -1.0;
        let operators = level.operators()?;
        self.diffusion.solve_mass(&operators.mass, &rhs, f)
    }

    fn f_impl_eval(
        &mut self,
        level: &FeLevel,
        u: &DVector<f64>,
        _t: f64,
        f: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        self.diffusion.f_impl_eval(level, u, f)
    }

    fn impl_solve(
        &mut self,
        level: &FeLevel,
        rhs: &DVector<f64>,
        _t: f64,
        c: f64,
        u: &mut DVector<f64>,
        f_impl: &mut DVector<f64>,
    ) -> Result<SolveOutcome, SdcError> {
        self.diffusion.impl_solve(level, rhs, c, u, f_impl)
    }

    fn residual(&self, level: &FeLevel, defect: &DVector<f64>, residual: &mut DVector<f64>) -> Result<(), SdcError> {
        self.diffusion.residual(level, defect, residual)
    }
}
