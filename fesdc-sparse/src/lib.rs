//! Sparse linear algebra for `fesdc`: linear operators, conjugate gradient, incomplete LU
//! preconditioning and a few CSR utilities missing from `nalgebra-sparse`.

pub mod cg;
pub mod ilu;
pub mod ops;

pub use nalgebra_sparse::pattern::SparsityPattern;
pub use nalgebra_sparse::CsrMatrix;
