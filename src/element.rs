//! Tensor-product Lagrange elements on the reference cell `[0, 1]^d`.
use crate::error::SdcError;
use fesdc_quadrature::collocation::lagrange_basis;
use nalgebra::DMatrixViewMut;

/// Derivatives of the Lagrange basis polynomials through `nodes`, evaluated at `x`.
fn lagrange_basis_derivatives(nodes: &[f64], x: f64) -> Vec<f64> {
    nodes
        .iter()
        .enumerate()
        .map(|(j, &x_j)| {
            // d/dx prod_{k != j} (x - x_k) / (x_j - x_k)
            let mut derivative = 0.0;
            for (m, &x_m) in nodes.iter().enumerate().filter(|&(m, _)| m != j) {
                let mut term = 1.0 / (x_j - x_m);
                for (_, &x_k) in nodes.iter().enumerate().filter(|&(k, _)| k != j && k != m) {
                    term *= (x - x_k) / (x_j - x_k);
                }
                derivative += term;
            }
            derivative
        })
        .collect()
}

/// The `Q_k` Lagrange element with equispaced nodes on the reference cell `[0, 1]^dim`.
///
/// Local nodes are numbered lexicographically with the first axis varying fastest, so that
/// node `i` sits at `multi_index(i) / order`.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeCell {
    dim: usize,
    order: usize,
    nodes_1d: Vec<f64>,
}

impl LagrangeCell {
    pub fn new(dim: usize, order: usize) -> Result<Self, SdcError> {
        if order == 0 {
            return Err(SdcError::configuration("basis order must be at least 1"));
        }
        if dim == 0 {
            return Err(SdcError::configuration("element dimension must be positive"));
        }
        let nodes_1d = (0..=order).map(|i| i as f64 / order as f64).collect();
        Ok(Self { dim, order, nodes_1d })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn nodes_per_axis(&self) -> usize {
        self.order + 1
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes_per_axis().pow(self.dim as u32)
    }

    pub fn local_multi_index(&self, local_node: usize) -> Vec<usize> {
        let n = self.nodes_per_axis();
        let mut remainder = local_node;
        (0..self.dim)
            .map(|_| {
                let i = remainder % n;
                remainder /= n;
                i
            })
            .collect()
    }

    /// Reference coordinates of the given local node.
    pub fn node_reference_coords(&self, local_node: usize) -> Vec<f64> {
        self.local_multi_index(local_node)
            .into_iter()
            .map(|i| self.nodes_1d[i])
            .collect()
    }

    /// Evaluates all basis functions at the reference coordinates `xi`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer or the coordinates have the wrong length.
    pub fn populate_basis(&self, basis_values: &mut [f64], xi: &[f64]) {
        assert_eq!(basis_values.len(), self.num_nodes());
        assert_eq!(xi.len(), self.dim);
        let values_1d: Vec<Vec<f64>> = xi.iter().map(|&x| lagrange_basis(&self.nodes_1d, x)).collect();
        for (i, phi) in basis_values.iter_mut().enumerate() {
            *phi = self
                .local_multi_index(i)
                .iter()
                .zip(&values_1d)
                .map(|(&j, values)| values[j])
                .product();
        }
    }

    /// Evaluates the reference gradients of all basis functions at `xi`.
    ///
    /// Column `i` of the `dim x num_nodes` output contains the gradient of basis function `i`.
    pub fn populate_basis_gradients(&self, mut basis_gradients: DMatrixViewMut<f64>, xi: &[f64]) {
        assert_eq!(basis_gradients.nrows(), self.dim);
        assert_eq!(basis_gradients.ncols(), self.num_nodes());
        assert_eq!(xi.len(), self.dim);
        let values_1d: Vec<Vec<f64>> = xi.iter().map(|&x| lagrange_basis(&self.nodes_1d, x)).collect();
        let derivatives_1d: Vec<Vec<f64>> = xi
            .iter()
            .map(|&x| lagrange_basis_derivatives(&self.nodes_1d, x))
            .collect();

        for i in 0..self.num_nodes() {
            let multi_index = self.local_multi_index(i);
            for axis in 0..self.dim {
                let mut gradient = 1.0;
                for (other_axis, &j) in multi_index.iter().enumerate() {
                    gradient *= if other_axis == axis {
                        derivatives_1d[other_axis][j]
                    } else {
                        values_1d[other_axis][j]
                    };
                }
                basis_gradients[(axis, i)] = gradient;
            }
        }
    }
}
