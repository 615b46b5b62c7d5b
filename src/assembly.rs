//! Global assembly of finite element operators into CSR matrices.
use crate::space::LagrangeSpace;
use fesdc_quadrature::tensor::unit_hypercube_gauss;
use fesdc_sparse::ops::diagonal;
use nalgebra::{DMatrix, DMatrixViewMut};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CsrMatrix, SparseFormatError};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AssemblyError {
    /// The assembled sparsity pattern or matrix data is not valid CSR.
    InvalidSparsity(String),
    /// An element contributes to an entry that is missing from the target pattern.
    MissingEntry { row: usize, col: usize },
    /// The requested local operator does not exist for the element.
    InvalidOperator(String),
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSparsity(message) => write!(f, "Invalid sparsity structure: {message}"),
            Self::MissingEntry { row, col } => {
                write!(f, "Entry ({row}, {col}) is not part of the sparsity pattern")
            }
            Self::InvalidOperator(message) => write!(f, "Invalid local operator: {message}"),
        }
    }
}

impl Error for AssemblyError {}

impl From<SparseFormatError> for AssemblyError {
    fn from(err: SparseFormatError) -> Self {
        Self::InvalidSparsity(err.to_string())
    }
}

pub trait ElementConnectivityAssembler {
    fn num_nodes(&self) -> usize;
    fn num_elements(&self) -> usize;
    fn element_node_count(&self, element_index: usize) -> usize;
    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize);
}

pub trait ElementMatrixAssembler: ElementConnectivityAssembler {
    fn assemble_element_matrix_into(
        &self,
        element_index: usize,
        output: DMatrixViewMut<f64>,
    ) -> Result<(), AssemblyError>;

    fn as_connectivity_assembler(&self) -> &dyn ElementConnectivityAssembler;
}

/// Bilinear forms available for scalar Lagrange spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalOperator {
    /// `∫ φ_i φ_j dx`
    Mass,
    /// `∫ ∇φ_i · ∇φ_j dx`
    Stiffness,
    /// `∫ φ_i ∂φ_j/∂x_axis dx`
    Derivative(usize),
}

/// Element assembler for a [`LagrangeSpace`] on a uniform grid.
///
/// All cells are translates of each other, so the element matrix is computed once.
#[derive(Debug, Clone)]
pub struct UniformElementAssembler<'a> {
    space: &'a LagrangeSpace,
    element_matrix: DMatrix<f64>,
}

impl<'a> UniformElementAssembler<'a> {
    pub fn new(space: &'a LagrangeSpace, operator: LocalOperator) -> Result<Self, AssemblyError> {
        let element = space.element();
        let dim = space.dim();
        if let LocalOperator::Derivative(axis) = operator {
            if axis >= dim {
                return Err(AssemblyError::InvalidOperator(format!(
                    "derivative along axis {axis} in a {dim}-dimensional space"
                )));
            }
        }

        let n = element.num_nodes();
        let h = space.grid().cell_size();
        // Exact for products of Q_k polynomials
        let quadrature = unit_hypercube_gauss(dim, element.order() + 1);
        let mut phi = vec![0.0; n];
        let mut phi_grad = DMatrix::zeros(dim, n);
        let mut element_matrix = DMatrix::zeros(n, n);

        for (w, xi) in quadrature.iter() {
            element.populate_basis(&mut phi, xi);
            element.populate_basis_gradients(DMatrixViewMut::from(&mut phi_grad), xi);
            for i in 0..n {
                for j in 0..n {
                    let integrand = match operator {
                        LocalOperator::Mass => phi[i] * phi[j],
                        LocalOperator::Stiffness => phi_grad.column(i).dot(&phi_grad.column(j)),
                        LocalOperator::Derivative(axis) => phi[i] * phi_grad[(axis, j)],
                    };
                    element_matrix[(i, j)] += w * integrand;
                }
            }
        }

        // Reference cell [0, 1]^d has unit volume, physical cells have volume h^d
        let scale = match operator {
            LocalOperator::Mass => h.powi(dim as i32),
            LocalOperator::Stiffness => h.powi(dim as i32 - 2),
            LocalOperator::Derivative(_) => h.powi(dim as i32 - 1),
        };
        element_matrix *= scale;

        Ok(Self { space, element_matrix })
    }

    pub fn element_matrix(&self) -> &DMatrix<f64> {
        &self.element_matrix
    }
}

impl<'a> ElementConnectivityAssembler for UniformElementAssembler<'a> {
    fn num_nodes(&self) -> usize {
        self.space.num_dofs()
    }

    fn num_elements(&self) -> usize {
        self.space.num_cells()
    }

    fn element_node_count(&self, _element_index: usize) -> usize {
        self.space.element().num_nodes()
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        self.space.populate_element_dofs(output, element_index);
    }
}

impl<'a> ElementMatrixAssembler for UniformElementAssembler<'a> {
    fn assemble_element_matrix_into(
        &self,
        _element_index: usize,
        mut output: DMatrixViewMut<f64>,
    ) -> Result<(), AssemblyError> {
        output.copy_from(&self.element_matrix);
        Ok(())
    }

    fn as_connectivity_assembler(&self) -> &dyn ElementConnectivityAssembler {
        self
    }
}

/// An assembler for CSR matrices.
#[derive(Debug, Clone, Default)]
pub struct CsrAssembler {
    // Buffers that prevent unnecessary allocations when assembling multiple matrices
    workspace: RefCell<CsrAssemblerWorkspace>,
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace {
    element_global_nodes: Vec<usize>,
    element_matrix: DMatrix<f64>,
}

impl Default for CsrAssemblerWorkspace {
    fn default() -> Self {
        Self {
            element_global_nodes: Vec::new(),
            element_matrix: DMatrix::zeros(0, 0),
        }
    }
}

impl CsrAssembler {
    pub fn assemble_pattern(
        &self,
        element_assembler: &dyn ElementConnectivityAssembler,
    ) -> Result<SparsityPattern, AssemblyError> {
        // Collecting into a BTreeSet stores each matrix entry exactly once, and in
        // row-major order
        let mut matrix_entries = BTreeSet::new();
        let mut element_global_nodes = Vec::new();
        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            element_global_nodes.resize(element_node_count, usize::MAX);
            element_assembler.populate_element_nodes(&mut element_global_nodes, i);

            for &node_i in &element_global_nodes {
                for &node_j in &element_global_nodes {
                    matrix_entries.insert((node_i, node_j));
                }
            }
        }

        let num_rows = element_assembler.num_nodes();
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            while i + 1 > offsets.len() {
                // Reached a new row. The loop handles consecutive empty rows
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }

        // Fill out the remaining offsets if the last rows are empty
        while offsets.len() < (num_rows + 1) {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .map_err(|err| AssemblyError::InvalidSparsity(err.to_string()))
    }

    pub fn assemble(&self, element_assembler: &dyn ElementMatrixAssembler) -> Result<CsrMatrix<f64>, AssemblyError> {
        let pattern = self.assemble_pattern(element_assembler.as_connectivity_assembler())?;
        let initial_matrix_values = vec![0.0; pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)?;
        self.assemble_into_csr(&mut matrix, element_assembler)?;
        Ok(matrix)
    }

    pub fn assemble_into_csr(
        &self,
        csr: &mut CsrMatrix<f64>,
        element_assembler: &dyn ElementMatrixAssembler,
    ) -> Result<(), AssemblyError> {
        // Reuse previously allocated buffers
        let ws = &mut *self.workspace.borrow_mut();
        let element_global_nodes = &mut ws.element_global_nodes;
        let element_matrix = &mut ws.element_matrix;
        let (offsets, cols, values) = csr.csr_data_mut();

        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);

            element_global_nodes.resize(element_node_count, 0);
            element_matrix.resize_mut(element_node_count, element_node_count, 0.0);
            element_matrix.fill(0.0);

            element_assembler.assemble_element_matrix_into(i, DMatrixViewMut::from(&mut *element_matrix))?;
            element_assembler.populate_element_nodes(element_global_nodes, i);

            for (local_row, &row) in element_global_nodes.iter().enumerate() {
                let row_begin = offsets[row];
                let row_cols = &cols[row_begin..offsets[row + 1]];
                for (local_col, &col) in element_global_nodes.iter().enumerate() {
                    let pos = row_cols
                        .binary_search(&col)
                        .map_err(|_| AssemblyError::MissingEntry { row, col })?;
                    values[row_begin + pos] += element_matrix[(local_row, local_col)];
                }
            }
        }

        Ok(())
    }
}

/// Homogeneous Dirichlet conditions for a system matrix.
///
/// Rows and columns of the given degrees of freedom are zeroed, and their diagonal entries
/// are set to a representative scale of the matrix so that it stays non-singular.
pub fn apply_homogeneous_dirichlet_bc_csr(matrix: &mut CsrMatrix<f64>, dofs: &[usize]) {
    // Simply setting 1 would ignore the scaling of the entries of the matrix, leading
    // to potentially poor condition numbers. The first non-zero diagonal entry is cheap
    // and reasonably representative.
    let scale = diagonal(matrix)
        .iter()
        .find(|&&x| x != 0.0)
        .map(|x| x.abs())
        .unwrap_or(1.0);
    apply_dirichlet_with_diagonal(matrix, dofs, scale);
}

/// Zeroes rows, columns and diagonal entries of the given degrees of freedom.
///
/// Used for operators that act on the right-hand side, whose boundary contributions must vanish.
pub fn zero_dirichlet_rows_and_columns_csr(matrix: &mut CsrMatrix<f64>, dofs: &[usize]) {
    apply_dirichlet_with_diagonal(matrix, dofs, 0.0);
}

fn apply_dirichlet_with_diagonal(matrix: &mut CsrMatrix<f64>, dofs: &[usize], diagonal_value: f64) {
    let n = matrix.nrows();
    let (offsets, cols, values) = matrix.csr_data_mut();

    // Since element patterns are structurally symmetric, visiting column j in a Dirichlet
    // row i tells us that row j has an entry in column i that must be zeroed too.
    let mut dirichlet_membership = vec![false; n];
    let mut rows_to_visit = vec![false; n];

    for &row in dofs {
        dirichlet_membership[row] = true;
        for idx in offsets[row]..offsets[row + 1] {
            let col = cols[idx];
            if col == row {
                values[idx] = diagonal_value;
            } else {
                values[idx] = 0.0;
                rows_to_visit[col] = true;
            }
        }
    }

    for row in (0..n).filter(|&row| rows_to_visit[row] && !dirichlet_membership[row]) {
        for idx in offsets[row]..offsets[row + 1] {
            if dirichlet_membership[cols[idx]] {
                values[idx] = 0.0;
            }
        }
    }
}
