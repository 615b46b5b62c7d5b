//! CSR kernels used by the solvers and the time integrators.
use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::{CsrMatrix, SparseFormatError};
use num::{One, Zero};

/// Computes `y = beta * y + alpha * A * x`.
///
/// # Panics
///
/// Panics if the dimensions of `y`, `A` and `x` are incompatible.
pub fn spmv_csr<T>(beta: T, mut y: DVectorViewMut<T>, alpha: T, a: &CsrMatrix<T>, x: DVectorView<T>)
where
    T: Scalar + Zero + ClosedMul + ClosedAdd,
{
    assert_eq!(y.len(), a.nrows(), "output dimension must match number of rows");
    assert_eq!(x.len(), a.ncols(), "input dimension must match number of columns");
    let offsets = a.row_offsets();
    let cols = a.col_indices();
    let values = a.values();
    for i in 0..a.nrows() {
        let mut dot = T::zero();
        for idx in offsets[i]..offsets[i + 1] {
            dot += values[idx].clone() * x[cols[idx]].clone();
        }
        y[i] = beta.clone() * y[i].clone() + alpha.clone() * dot;
    }
}

/// Convenience wrapper returning `A * x` as a new vector.
pub fn csr_mul_vector<T>(a: &CsrMatrix<T>, x: &DVector<T>) -> DVector<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    let mut y = DVector::zeros(a.nrows());
    spmv_csr(T::zero(), DVectorViewMut::from(&mut y), T::one(), a, DVectorView::from(x));
    y
}

/// Computes `A + alpha * B` for matrices with possibly different sparsity patterns.
///
/// The result has the union of both patterns. Explicitly stored zeros are preserved.
pub fn add_scaled<T>(a: &CsrMatrix<T>, alpha: T, b: &CsrMatrix<T>) -> Result<CsrMatrix<T>, SparseFormatError>
where
    T: RealField,
{
    assert_eq!(a.nrows(), b.nrows(), "matrices must have the same number of rows");
    assert_eq!(a.ncols(), b.ncols(), "matrices must have the same number of columns");

    let (a_offsets, a_cols, a_values) = (a.row_offsets(), a.col_indices(), a.values());
    let (b_offsets, b_cols, b_values) = (b.row_offsets(), b.col_indices(), b.values());

    let mut offsets = Vec::with_capacity(a.nrows() + 1);
    let mut cols = Vec::with_capacity(a.nnz().max(b.nnz()));
    let mut values = Vec::with_capacity(a.nnz().max(b.nnz()));
    offsets.push(0);
    for i in 0..a.nrows() {
        let (mut p, a_end) = (a_offsets[i], a_offsets[i + 1]);
        let (mut q, b_end) = (b_offsets[i], b_offsets[i + 1]);
        // Merge the two sorted rows
        while p < a_end || q < b_end {
            let a_col = (p < a_end).then(|| a_cols[p]);
            let b_col = (q < b_end).then(|| b_cols[q]);
            match (a_col, b_col) {
                (Some(j), Some(k)) if j == k => {
                    cols.push(j);
                    values.push(a_values[p].clone() + alpha.clone() * b_values[q].clone());
                    p += 1;
                    q += 1;
                }
                (Some(j), Some(k)) if j < k => {
                    cols.push(j);
                    values.push(a_values[p].clone());
                    p += 1;
                }
                (Some(j), None) => {
                    cols.push(j);
                    values.push(a_values[p].clone());
                    p += 1;
                }
                (_, Some(k)) => {
                    cols.push(k);
                    values.push(alpha.clone() * b_values[q].clone());
                    q += 1;
                }
                (None, None) => break,
            }
        }
        offsets.push(cols.len());
    }

    CsrMatrix::try_from_csr_data(a.nrows(), a.ncols(), offsets, cols, values)
}

/// Computes `sum_i alpha_i * A_i` over the given terms.
///
/// Returns `Ok(None)` if there are no terms.
pub fn linear_combination<'a, T>(
    terms: impl IntoIterator<Item = (T, &'a CsrMatrix<T>)>,
) -> Result<Option<CsrMatrix<T>>, SparseFormatError>
where
    T: RealField,
{
    let mut result: Option<CsrMatrix<T>> = None;
    for (alpha, matrix) in terms {
        result = Some(match result {
            None => {
                let mut scaled = matrix.clone();
                for v in scaled.values_mut() {
                    *v *= alpha.clone();
                }
                scaled
            }
            Some(sum) => add_scaled(&sum, alpha, matrix)?,
        });
    }
    Ok(result)
}

/// Extracts the diagonal of a square CSR matrix, with zeros where no entry is stored.
pub fn diagonal<T>(a: &CsrMatrix<T>) -> DVector<T>
where
    T: Scalar + Zero,
{
    let mut diag = DVector::zeros(a.nrows().min(a.ncols()));
    for (i, row) in a.row_iter().enumerate().take(diag.len()) {
        if let Some(pos) = row.col_indices().iter().position(|&j| j == i) {
            diag[i] = row.values()[pos].clone();
        }
    }
    diag
}
