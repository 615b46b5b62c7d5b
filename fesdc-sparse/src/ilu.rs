//! Incomplete LU factorization with zero fill-in.
//!
//! The factors share the sparsity pattern of the input matrix. `L` is unit lower triangular
//! and stored strictly below the diagonal, `U` is stored on and above the diagonal.
use crate::cg::LinearOperator;
use nalgebra::{DVectorView, DVectorViewMut, RealField};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IluError {
    /// The matrix is not square.
    NotSquare { nrows: usize, ncols: usize },
    /// The row has no explicitly stored diagonal entry.
    MissingDiagonal { row: usize },
    /// A zero pivot was encountered during factorization.
    ZeroPivot { row: usize },
}

impl fmt::Display for IluError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSquare { nrows, ncols } => {
                write!(f, "ILU(0) requires a square matrix, got {nrows} x {ncols}")
            }
            Self::MissingDiagonal { row } => write!(f, "Row {row} has no stored diagonal entry"),
            Self::ZeroPivot { row } => write!(f, "Zero pivot encountered in row {row}"),
        }
    }
}

impl Error for IluError {}

#[derive(Debug, Clone)]
pub struct Ilu0<T> {
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<T>,
    diagonal_positions: Vec<usize>,
}

impl<T: RealField> Ilu0<T> {
    /// Factors the given matrix.
    ///
    /// Column indices of each row are assumed sorted, as guaranteed by [`CsrMatrix`].
    pub fn factor(matrix: &CsrMatrix<T>) -> Result<Self, IluError> {
        let n = matrix.nrows();
        if matrix.ncols() != n {
            return Err(IluError::NotSquare {
                nrows: n,
                ncols: matrix.ncols(),
            });
        }

        let row_offsets = matrix.row_offsets().to_vec();
        let col_indices = matrix.col_indices().to_vec();
        let mut values = matrix.values().to_vec();

        let diagonal_positions = (0..n)
            .map(|i| {
                let row_cols = &col_indices[row_offsets[i]..row_offsets[i + 1]];
                row_cols
                    .binary_search(&i)
                    .map(|pos| row_offsets[i] + pos)
                    .map_err(|_| IluError::MissingDiagonal { row: i })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // IKJ variant, restricted to the existing pattern
        for i in 0..n {
            for kk in row_offsets[i]..diagonal_positions[i] {
                let k = col_indices[kk];
                let pivot = values[diagonal_positions[k]].clone();
                if pivot == T::zero() {
                    return Err(IluError::ZeroPivot { row: k });
                }
                let l_ik = values[kk].clone() / pivot;
                values[kk] = l_ik.clone();

                let u_start = diagonal_positions[k] + 1;
                let u_end = row_offsets[k + 1];
                for jj in (kk + 1)..row_offsets[i + 1] {
                    let j = col_indices[jj];
                    if let Ok(pos) = col_indices[u_start..u_end].binary_search(&j) {
                        let u_kj = values[u_start + pos].clone();
                        values[jj] -= l_ik.clone() * u_kj;
                    }
                }
            }
            if values[diagonal_positions[i]] == T::zero() {
                return Err(IluError::ZeroPivot { row: i });
            }
        }

        Ok(Self {
            row_offsets,
            col_indices,
            values,
            diagonal_positions,
        })
    }

    pub fn dim(&self) -> usize {
        self.diagonal_positions.len()
    }

    /// Computes `y = (LU)^{-1} x` by forward and backward substitution.
    pub fn solve_into(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        let n = self.dim();
        assert_eq!(x.len(), n, "right-hand side dimension must match factorization");
        assert_eq!(y.len(), n, "output dimension must match factorization");

        // L z = x, with unit diagonal
        for i in 0..n {
            let mut sum = x[i].clone();
            for idx in self.row_offsets[i]..self.diagonal_positions[i] {
                sum -= self.values[idx].clone() * y[self.col_indices[idx]].clone();
            }
            y[i] = sum;
        }

        // U y = z
        for i in (0..n).rev() {
            let diag = self.diagonal_positions[i];
            let mut sum = y[i].clone();
            for idx in (diag + 1)..self.row_offsets[i + 1] {
                sum -= self.values[idx].clone() * y[self.col_indices[idx]].clone();
            }
            y[i] = sum / self.values[diag].clone();
        }
    }
}

impl<T: RealField> LinearOperator<T> for Ilu0<T> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        self.solve_into(y, x);
        Ok(())
    }
}
