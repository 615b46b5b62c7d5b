//! Transfer between a coarse and a fine level for two-level SDC.
//!
//! Space is transferred with finite element interpolation: `P` evaluates coarse functions at
//! the fine nodal points, `R` evaluates fine functions at the coarse nodal points. Time is
//! restricted by injection, which requires the coarse collocation nodes to be fine nodes,
//! and interpolated with Lagrange polynomials through the coarse points.
use crate::controller::Status;
use crate::error::SdcError;
use crate::fe_manager::{FeManager, LevelHandle};
use crate::splitting::ImexSplitting;
use crate::sweeper::ImexSweeper;
use fesdc_quadrature::lagrange_interpolation_matrix;
use fesdc_sparse::ops::csr_mul_vector;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

#[derive(Debug, Clone)]
pub struct SpectralTransfer {
    coarse_level: LevelHandle,
    fine_level: LevelHandle,
    /// `coarse x fine`
    restriction: CsrMatrix<f64>,
    /// `fine x coarse`
    prolongation: CsrMatrix<f64>,
    /// Index of the fine node coinciding with each coarse node.
    time_injection: Vec<usize>,
    /// Lagrange interpolation from the coarse time points to the fine nodes.
    time_interpolation: DMatrix<f64>,
    /// Index into the coarse node values of the first coarse time point.
    ///
    /// This is `0` if `τ = 0` is prepended to the coarse nodes, and `1` otherwise.
    first_coarse_point: usize,
}

impl SpectralTransfer {
    /// Builds the transfer operators between two sweepers that have been set up.
    pub fn create<C, F>(fe: &FeManager, coarse: &ImexSweeper<C>, fine: &ImexSweeper<F>) -> Result<Self, SdcError>
    where
        C: ImexSplitting,
        F: ImexSplitting,
    {
        let coarse_space = fe.level(coarse.level())?.space();
        let fine_space = fe.level(fine.level())?.space();
        let restriction = fine_space.evaluation_matrix(coarse_space)?;
        let prolongation = coarse_space.evaluation_matrix(fine_space)?;

        let coarse_nodes = coarse.collocation()?;
        let fine_nodes = fine.collocation()?;
        let time_injection = coarse_nodes.embedding_in(fine_nodes).ok_or_else(|| {
            SdcError::configuration(format!(
                "coarse {} nodes ({}) are not a subset of fine {} nodes ({})",
                coarse_nodes.quadrature_type(),
                coarse_nodes.num_nodes(),
                fine_nodes.quadrature_type(),
                fine_nodes.num_nodes()
            ))
        })?;

        let (coarse_points, first_coarse_point) = if coarse_nodes.left_is_node() {
            (coarse_nodes.nodes().to_vec(), 1)
        } else {
            let mut points = vec![0.0];
            points.extend_from_slice(coarse_nodes.nodes());
            (points, 0)
        };
        let time_interpolation = lagrange_interpolation_matrix(&coarse_points, fine_nodes.nodes());

        debug!(
            "Created transfer: {} coarse dofs, {} fine dofs, {} coarse and {} fine nodes",
            coarse_space.num_dofs(),
            fine_space.num_dofs(),
            coarse_nodes.num_nodes(),
            fine_nodes.num_nodes()
        );

        Ok(Self {
            coarse_level: coarse.level(),
            fine_level: fine.level(),
            restriction,
            prolongation,
            time_injection,
            time_interpolation,
            first_coarse_point,
        })
    }

    pub fn coarse_level(&self) -> LevelHandle {
        self.coarse_level
    }

    pub fn fine_level(&self) -> LevelHandle {
        self.fine_level
    }

    pub fn restriction_matrix(&self) -> &CsrMatrix<f64> {
        &self.restriction
    }

    pub fn prolongation_matrix(&self) -> &CsrMatrix<f64> {
        &self.prolongation
    }

    pub fn time_injection(&self) -> &[usize] {
        &self.time_injection
    }

    pub fn restrict(&self, fine_state: &DVector<f64>) -> Result<DVector<f64>, SdcError> {
        SdcError::check_dimension(self.restriction.ncols(), fine_state.len())?;
        Ok(csr_mul_vector(&self.restriction, fine_state))
    }

    pub fn interpolate(&self, coarse_state: &DVector<f64>) -> Result<DVector<f64>, SdcError> {
        SdcError::check_dimension(self.prolongation.ncols(), coarse_state.len())?;
        Ok(csr_mul_vector(&self.prolongation, coarse_state))
    }

    /// Seeds the initial value of the coarse level with the restricted fine initial value.
    pub fn restrict_initial<C, F>(&self, fine: &ImexSweeper<F>, coarse: &mut ImexSweeper<C>) -> Result<(), SdcError>
    where
        C: ImexSplitting,
        F: ImexSplitting,
    {
        let initial = self.restrict(fine.initial_value()?)?;
        coarse.set_initial_value(&initial)
    }

    /// Overwrites all coarse node values with restricted fine values.
    ///
    /// The coarse right-hand sides are re-evaluated, and the result is saved so that the
    /// coarse correction can later be computed by [`interpolate_correction`](Self::interpolate_correction).
    pub fn restrict_states<C, F>(
        &self,
        fe: &FeManager,
        status: &Status,
        fine: &ImexSweeper<F>,
        coarse: &mut ImexSweeper<C>,
    ) -> Result<(), SdcError>
    where
        C: ImexSplitting,
        F: ImexSplitting,
    {
        let fine_states = fine.states();
        let mut states = Vec::with_capacity(self.time_injection.len() + 1);
        states.push(self.restrict(&fine_states[0])?);
        for &fine_node in &self.time_injection {
            states.push(self.restrict(&fine_states[fine_node + 1])?);
        }
        coarse.set_states(fe, status, states)?;
        coarse.save_snapshot();
        Ok(())
    }

    /// Sets the FAS correction of the coarse level.
    ///
    /// `τ_c,m = R (dt Q_f F_f + τ_f)_m - dt (Q_c F_c)_m` at every coarse node `m`, where `F_c`
    /// must be the coarse right-hand sides of the restricted fine values. Must therefore be
    /// called right after [`restrict_states`](Self::restrict_states).
    pub fn fas<C, F>(&self, status: &Status, fine: &ImexSweeper<F>, coarse: &mut ImexSweeper<C>) -> Result<(), SdcError>
    where
        C: ImexSplitting,
        F: ImexSplitting,
    {
        let dt = status.dt();
        let fine_integrals = fine.integrals(dt)?;
        let coarse_integrals = coarse.integrals(dt)?;
        let fine_tau = fine.tau();

        let mut tau = Vec::with_capacity(self.time_injection.len() + 1);
        tau.push(DVector::zeros(self.restriction.nrows()));
        for (coarse_integral, &fine_node) in coarse_integrals.iter().zip(&self.time_injection) {
            let mut fine_value = fine_integrals[fine_node].clone();
            fine_value += &fine_tau[fine_node + 1];
            let mut tau_m = self.restrict(&fine_value)?;
            tau_m -= coarse_integral;
            tau.push(tau_m);
        }
        coarse.set_tau(tau)
    }

    /// Adds the interpolated coarse correction to the fine node values and right-hand sides.
    pub fn interpolate_correction<C, F>(
        &self,
        coarse: &ImexSweeper<C>,
        fine: &mut ImexSweeper<F>,
    ) -> Result<(), SdcError>
    where
        C: ImexSplitting,
        F: ImexSplitting,
    {
        let [du, df_expl, df_impl] = coarse.corrections()?;
        let du = self.interpolate_in_time_and_space(&du)?;
        let df_expl = self.interpolate_in_time_and_space(&df_expl)?;
        let df_impl = self.interpolate_in_time_and_space(&df_impl)?;
        fine.add_corrections(&du, &df_expl, &df_impl)
    }

    /// Interpolates coarse node values, including the initial value, to the fine nodes.
    fn interpolate_in_time_and_space(&self, coarse_values: &[DVector<f64>]) -> Result<Vec<DVector<f64>>, SdcError> {
        let points = coarse_values
            .get(self.first_coarse_point..)
            .ok_or_else(|| SdcError::invalid_state("missing coarse node values"))?;
        SdcError::check_dimension(self.time_interpolation.ncols(), points.len())?;

        let interpolated = points
            .iter()
            .map(|value| self.interpolate(value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self
            .time_interpolation
            .row_iter()
            .map(|weights| {
                let mut fine_value = DVector::zeros(self.prolongation.nrows());
                for (&w, value) in weights.iter().zip(&interpolated) {
                    fine_value.axpy(w, value, 1.0);
                }
                fine_value
            })
            .collect())
    }
}
