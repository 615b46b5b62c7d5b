//! Continuous Lagrange finite element spaces on uniform grids.
use crate::element::LagrangeCell;
use crate::error::SdcError;
use crate::mesh::UniformGrid;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Entries of interpolation matrices below this magnitude are not stored.
const EVALUATION_DROP_TOLERANCE: f64 = 1e-14;

/// A scalar, continuous `Q_k` space on a [`UniformGrid`].
///
/// Degrees of freedom are the values at the `n k + 1` equispaced points per axis, numbered
/// lexicographically with the first axis varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeSpace {
    grid: UniformGrid,
    element: LagrangeCell,
}

impl LagrangeSpace {
    pub fn new(grid: UniformGrid, order: usize) -> Result<Self, SdcError> {
        let element = LagrangeCell::new(grid.dim(), order)?;
        Ok(Self { grid, element })
    }

    /// Convenience constructor for the unit hypercube.
    pub fn unit_hypercube(dim: usize, cells_per_dim: usize, order: usize) -> Result<Self, SdcError> {
        Self::new(UniformGrid::unit_hypercube(dim, cells_per_dim)?, order)
    }

    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    pub fn element(&self) -> &LagrangeCell {
        &self.element
    }

    pub fn dim(&self) -> usize {
        self.grid.dim()
    }

    pub fn order(&self) -> usize {
        self.element.order()
    }

    pub fn num_cells(&self) -> usize {
        self.grid.num_cells()
    }

    pub fn dofs_per_axis(&self) -> usize {
        self.grid.cells_per_dim() * self.order() + 1
    }

    pub fn num_dofs(&self) -> usize {
        self.dofs_per_axis().pow(self.dim() as u32)
    }

    pub fn dof_multi_index(&self, dof: usize) -> Vec<usize> {
        let n = self.dofs_per_axis();
        let mut remainder = dof;
        (0..self.dim())
            .map(|_| {
                let i = remainder % n;
                remainder /= n;
                i
            })
            .collect()
    }

    pub fn dof_index(&self, multi_index: &[usize]) -> usize {
        let n = self.dofs_per_axis();
        multi_index
            .iter()
            .rev()
            .fold(0, |index, &i| index * n + i)
    }

    pub fn dof_coordinates(&self, dof: usize) -> Vec<f64> {
        let spacing = (self.dofs_per_axis() - 1) as f64;
        self.dof_multi_index(dof)
            .into_iter()
            .map(|i| i as f64 / spacing)
            .collect()
    }

    /// Global indices of the degrees of freedom of a cell, in local node order.
    pub fn populate_element_dofs(&self, output: &mut [usize], cell: usize) {
        assert_eq!(output.len(), self.element.num_nodes());
        let k = self.order();
        let cell_index = self.grid.cell_multi_index(cell);
        let mut global = vec![0; self.dim()];
        for (local_node, dof) in output.iter_mut().enumerate() {
            for ((g, &c), l) in global
                .iter_mut()
                .zip(&cell_index)
                .zip(self.element.local_multi_index(local_node))
            {
                *g = c * k + l;
            }
            *dof = self.dof_index(&global);
        }
    }

    pub fn element_dofs(&self, cell: usize) -> Vec<usize> {
        let mut dofs = vec![0; self.element.num_nodes()];
        self.populate_element_dofs(&mut dofs, cell);
        dofs
    }

    /// Degrees of freedom on the boundary of the unit hypercube, in ascending order.
    pub fn boundary_dofs(&self) -> Vec<usize> {
        let last = self.dofs_per_axis() - 1;
        (0..self.num_dofs())
            .filter(|&dof| {
                self.dof_multi_index(dof)
                    .iter()
                    .any(|&i| i == 0 || i == last)
            })
            .collect()
    }

    /// Evaluates the finite element function with coefficients `u` at the given point.
    pub fn evaluate(&self, u: &DVector<f64>, point: &[f64]) -> f64 {
        assert_eq!(u.len(), self.num_dofs());
        let (cell, xi) = self.grid.locate(point);
        let mut phi = vec![0.0; self.element.num_nodes()];
        self.element.populate_basis(&mut phi, &xi);
        self.element_dofs(cell)
            .into_iter()
            .zip(phi)
            .map(|(dof, phi)| u[dof] * phi)
            .sum()
    }

    /// Nodal interpolation of `f`.
    pub fn interpolate(&self, f: impl Fn(&[f64]) -> f64) -> DVector<f64> {
        DVector::from_iterator(
            self.num_dofs(),
            (0..self.num_dofs()).map(|dof| f(&self.dof_coordinates(dof))),
        )
    }

    /// The matrix evaluating functions of this space at the nodal points of `target`.
    ///
    /// The result has dimensions `target.num_dofs() x self.num_dofs()`. When the nodes of
    /// `target` are also nodes of `self`, every row holds a single unit entry.
    pub fn evaluation_matrix(&self, target: &LagrangeSpace) -> Result<CsrMatrix<f64>, SdcError> {
        SdcError::check_dimension(self.dim(), target.dim())?;
        let mut coo = CooMatrix::new(target.num_dofs(), self.num_dofs());
        let mut phi = vec![0.0; self.element.num_nodes()];
        let mut dofs = vec![0; self.element.num_nodes()];
        for target_dof in 0..target.num_dofs() {
            let (cell, xi) = self.grid.locate(&target.dof_coordinates(target_dof));
            self.element.populate_basis(&mut phi, &xi);
            self.populate_element_dofs(&mut dofs, cell);
            for (&dof, &value) in dofs.iter().zip(&phi) {
                if value.abs() > EVALUATION_DROP_TOLERANCE {
                    coo.push(target_dof, dof, value);
                }
            }
        }
        Ok(CsrMatrix::from(&coo))
    }
}
