//! Preconditioned conjugate gradient for symmetric positive definite operators.
//!
//! A [`PcgSolver`] owns its settings and work vectors, so repeated solves of systems with
//! the same size do not allocate:
//!
//! ```ignore
//! let mut solver = PcgSolver::new(CgSettings::new(1e-10, 500));
//! let outcome = solver.solve(&matrix, &ilu, DVectorView::from(&b), DVectorViewMut::from(&mut x))?;
//! if !outcome.converged {
//!     // the iteration cap was reached, `x` holds the last iterate
//! }
//! ```
//!
//! Reaching the iteration cap is reported through [`CgOutcome::converged`]. Only breakdowns
//! of the recurrence and failing operators are errors.
use crate::ops::spmv_csr;
use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;
use std::fmt;

/// A linear map `y = A x` on vectors of a fixed length.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        spmv_csr(T::zero(), y, T::one(), self, x);
        Ok(())
    }
}

/// The unpreconditioned case, `P = I`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Stopping rule of a solve: `||r|| <= tolerance * ||b||` or `max_iterations` updates.
///
/// The residual tested is the one maintained by the recurrence, which may drift from the
/// true residual for ill-conditioned systems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgSettings<T> {
    pub tolerance: T,
    pub max_iterations: usize,
}

impl<T> CgSettings<T> {
    pub fn new(tolerance: T, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

impl Default for CgSettings<f64> {
    fn default() -> Self {
        Self::new(1e-10, 500)
    }
}

/// Result of a solve that did not break down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgOutcome<T> {
    /// Number of updates made to the initial guess.
    pub iterations: usize,
    /// Norm of the recurrence residual when the solver stopped.
    pub residual_norm: T,
    /// `false` if the iteration cap was reached before the tolerance.
    pub converged: bool,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum CgError {
    /// Right-hand side and solution vector differ in length.
    DimensionMismatch { rhs: usize, solution: usize },
    Operator(Box<dyn Error>),
    Preconditioner(Box<dyn Error>),
    /// `p^T A p <= 0` was encountered in the given iteration.
    IndefiniteOperator { iteration: usize },
    /// `r^T P r <= 0` was encountered in the given iteration.
    IndefinitePreconditioner { iteration: usize },
}

impl fmt::Display for CgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { rhs, solution } => {
                write!(f, "right-hand side has length {rhs}, solution has length {solution}")
            }
            Self::Operator(err) => write!(f, "error applying operator: {err}"),
            Self::Preconditioner(err) => write!(f, "error applying preconditioner: {err}"),
            Self::IndefiniteOperator { iteration } => {
                write!(f, "operator appears to be indefinite (iteration {iteration})")
            }
            Self::IndefinitePreconditioner { iteration } => {
                write!(f, "preconditioner appears to be indefinite (iteration {iteration})")
            }
        }
    }
}

impl Error for CgError {}

/// Conjugate gradient with a fixed stopping rule and reusable work vectors.
#[derive(Debug, Clone)]
pub struct PcgSolver<T: Scalar> {
    settings: CgSettings<T>,
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    ap: DVector<T>,
}

impl<T: RealField + Copy> PcgSolver<T> {
    pub fn new(settings: CgSettings<T>) -> Self {
        Self {
            settings,
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            ap: DVector::zeros(0),
        }
    }

    pub fn settings(&self) -> &CgSettings<T> {
        &self.settings
    }

    fn resize_work_vectors(&mut self, n: usize) {
        for v in [&mut self.r, &mut self.z, &mut self.p, &mut self.ap] {
            if v.len() != n {
                *v = DVector::zeros(n);
            }
        }
    }

    /// Solves `A x = b`, starting from the values in `x`.
    ///
    /// A zero right-hand side yields `x = 0` without iterating.
    pub fn solve<A, P>(
        &mut self,
        operator: &A,
        preconditioner: &P,
        b: DVectorView<T>,
        mut x: DVectorViewMut<T>,
    ) -> Result<CgOutcome<T>, CgError>
    where
        A: ?Sized + LinearOperator<T>,
        P: ?Sized + LinearOperator<T>,
    {
        if b.len() != x.len() {
            return Err(CgError::DimensionMismatch {
                rhs: b.len(),
                solution: x.len(),
            });
        }
        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(CgOutcome {
                iterations: 0,
                residual_norm: T::zero(),
                converged: true,
            });
        }
        self.resize_work_vectors(b.len());
        let CgSettings {
            tolerance,
            max_iterations,
        } = self.settings;
        let threshold = tolerance * b_norm;

        // r = b - A x
        operator
            .apply(DVectorViewMut::from(&mut self.r), DVectorView::from(&x))
            .map_err(CgError::Operator)?;
        self.r.axpy(T::one(), &b, -T::one());
        preconditioner
            .apply(DVectorViewMut::from(&mut self.z), DVectorView::from(&self.r))
            .map_err(CgError::Preconditioner)?;
        self.p.copy_from(&self.z);

        let mut rz = self.r.dot(&self.z);
        let mut residual_norm = self.r.norm();
        let mut iterations = 0;

        while residual_norm > threshold {
            if iterations >= max_iterations {
                return Ok(CgOutcome {
                    iterations,
                    residual_norm,
                    converged: false,
                });
            }
            if rz <= T::zero() {
                return Err(CgError::IndefinitePreconditioner { iteration: iterations });
            }

            operator
                .apply(DVectorViewMut::from(&mut self.ap), DVectorView::from(&self.p))
                .map_err(CgError::Operator)?;
            let pap = self.p.dot(&self.ap);
            if pap <= T::zero() {
                return Err(CgError::IndefiniteOperator { iteration: iterations });
            }

            let alpha = rz / pap;
            x.axpy(alpha, &self.p, T::one());
            self.r.axpy(-alpha, &self.ap, T::one());
            iterations += 1;
            residual_norm = self.r.norm();

            preconditioner
                .apply(DVectorViewMut::from(&mut self.z), DVectorView::from(&self.r))
                .map_err(CgError::Preconditioner)?;
            let rz_next = self.r.dot(&self.z);
            // p = z + beta p
            self.p.axpy(T::one(), &self.z, rz_next / rz);
            rz = rz_next;
        }

        Ok(CgOutcome {
            iterations,
            residual_norm,
            converged: true,
        })
    }
}
