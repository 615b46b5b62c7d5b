//! Error handling for SDC and MLSDC runs.
use crate::assembly::AssemblyError;
use fesdc_sparse::cg::CgError;
use fesdc_sparse::ilu::IluError;
use nalgebra_sparse::SparseFormatError;
use std::error::Error;
use std::fmt;

/// Errors that abort setup or a run.
///
/// A linear solve that fails to reach its tolerance within the iteration cap is *not* an
/// error. It is recorded by the sweeper and shows up as a non-converged step instead.
#[derive(Debug)]
#[non_exhaustive]
pub enum SdcError {
    /// Invalid parameters, detected before any numerical work is started.
    Configuration(String),
    /// Operators for a level could not be assembled.
    Assembly(AssemblyError),
    /// Unrecoverable breakdown of a linear solver or preconditioner.
    LinearSolver(String),
    /// An operation was invoked in a state that does not permit it.
    InvalidState(String),
    DimensionMismatch { expected: usize, actual: usize },
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl SdcError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { expected, actual })
        }
    }
}

impl fmt::Display for SdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "Configuration error: {message}"),
            Self::Assembly(err) => write!(f, "Assembly failed: {err}"),
            Self::LinearSolver(message) => write!(f, "Linear solver failed: {message}"),
            Self::InvalidState(message) => write!(f, "Invalid state: {message}"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Json(err) => write!(f, "Invalid JSON: {err}"),
        }
    }
}

impl Error for SdcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Assembly(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AssemblyError> for SdcError {
    fn from(err: AssemblyError) -> Self {
        Self::Assembly(err)
    }
}

impl From<SparseFormatError> for SdcError {
    fn from(err: SparseFormatError) -> Self {
        Self::Assembly(AssemblyError::from(err))
    }
}

impl From<CgError> for SdcError {
    fn from(err: CgError) -> Self {
        Self::LinearSolver(format!("CG failed: {err}"))
    }
}

impl From<IluError> for SdcError {
    fn from(err: IluError) -> Self {
        Self::LinearSolver(format!("ILU(0) factorization failed: {err}"))
    }
}

impl From<fesdc_quadrature::Error> for SdcError {
    fn from(err: fesdc_quadrature::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for SdcError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SdcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
