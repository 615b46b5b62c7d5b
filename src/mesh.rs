//! Uniform structured grids on the unit hypercube.
use crate::error::SdcError;

/// A uniform grid of `cells_per_dim^dim` axis-aligned cells covering `[0, 1]^dim`.
///
/// Cells are numbered lexicographically with the first axis varying fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformGrid {
    dim: usize,
    cells_per_dim: usize,
}

impl UniformGrid {
    pub const MAX_DIM: usize = 3;

    pub fn unit_hypercube(dim: usize, cells_per_dim: usize) -> Result<Self, SdcError> {
        if dim == 0 || dim > Self::MAX_DIM {
            return Err(SdcError::configuration(format!(
                "grid dimension must be between 1 and {}, got {dim}",
                Self::MAX_DIM
            )));
        }
        if cells_per_dim == 0 {
            return Err(SdcError::configuration("grid must have at least one cell per dimension"));
        }
        Ok(Self { dim, cells_per_dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn cells_per_dim(&self) -> usize {
        self.cells_per_dim
    }

    pub fn num_cells(&self) -> usize {
        self.cells_per_dim.pow(self.dim as u32)
    }

    /// Edge length `h` of every cell.
    pub fn cell_size(&self) -> f64 {
        1.0 / self.cells_per_dim as f64
    }

    /// Multi-index of the given cell.
    pub fn cell_multi_index(&self, cell: usize) -> Vec<usize> {
        let n = self.cells_per_dim;
        let mut remainder = cell;
        (0..self.dim)
            .map(|_| {
                let i = remainder % n;
                remainder /= n;
                i
            })
            .collect()
    }

    /// Coordinates of the lower corner of the given cell.
    pub fn cell_origin(&self, cell: usize) -> Vec<f64> {
        let h = self.cell_size();
        self.cell_multi_index(cell)
            .into_iter()
            .map(|i| i as f64 * h)
            .collect()
    }

    /// Maps reference coordinates in `[0, 1]^dim` of a cell to physical coordinates.
    pub fn map_reference_coords(&self, cell: usize, xi: &[f64]) -> Vec<f64> {
        let h = self.cell_size();
        self.cell_origin(cell)
            .into_iter()
            .zip(xi)
            .map(|(x0, xi)| x0 + h * xi)
            .collect()
    }

    /// Finds a cell containing `point`, together with the reference coordinates of the point.
    ///
    /// Points on a shared face are assigned to the cell with the larger index, except on the
    /// upper boundary of the domain. Points outside the domain are clamped onto it.
    pub fn locate(&self, point: &[f64]) -> (usize, Vec<f64>) {
        assert_eq!(point.len(), self.dim, "point dimension must match grid dimension");
        let n = self.cells_per_dim;
        let mut cell = 0;
        let mut stride = 1;
        let mut xi = Vec::with_capacity(self.dim);
        for &x in point {
            let scaled = x.clamp(0.0, 1.0) * n as f64;
            let i = (scaled.floor() as usize).min(n - 1);
            xi.push(scaled - i as f64);
            cell += stride * i;
            stride *= n;
        }
        (cell, xi)
    }
}
