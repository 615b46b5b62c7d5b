//! Quadrature rules for finite element assembly and collocation node sets for
//! spectral deferred correction.
//!
//! Univariate and tensor-product rules follow the reference domain `[-1, 1]^d`.
//! Collocation node sets live on the unit time interval `[0, 1]` and carry the
//! integration matrices needed by SDC sweepers.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod collocation;
pub mod tensor;
pub mod univariate;

pub use collocation::{lagrange_interpolation_matrix, CollocationNodes, QuadratureType};

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The requested number of collocation nodes is not supported by the quadrature family.
    InvalidNodeCount {
        quadrature_type: QuadratureType,
        num_nodes: usize,
    },
    /// The name does not correspond to any known quadrature family.
    UnknownQuadratureType(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNodeCount {
                quadrature_type,
                num_nodes,
            } => {
                write!(
                    f,
                    "{quadrature_type} quadrature does not support {num_nodes} node(s) (at least 2 are required)"
                )
            }
            Self::UnknownQuadratureType(name) => write!(f, "Unknown quadrature type '{name}'"),
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A rule whose dimension is only known at runtime.
///
/// Points are stored contiguously, `dim` coordinates per point.
#[derive(Debug, Clone, PartialEq)]
pub struct DynRule {
    dim: usize,
    weights: Vec<f64>,
    points: Vec<f64>,
}

impl DynRule {
    pub fn from_weights_and_points(dim: usize, weights: Vec<f64>, points: Vec<f64>) -> Self {
        assert_eq!(points.len(), dim * weights.len(), "point storage must hold dim coordinates per weight");
        Self { dim, weights, points }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn point(&self, index: usize) -> &[f64] {
        &self.points[self.dim * index..self.dim * (index + 1)]
    }

    /// Iterate over `(weight, point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> {
        self.weights
            .iter()
            .copied()
            .zip(self.points.chunks_exact(self.dim.max(1)))
    }
}

/// Approximate the integral of `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, x)| w * f(x)).sum()
}

/// Approximate the integral of `f` with a runtime-dimensional rule.
pub fn integrate_dyn(rule: &DynRule, f: impl Fn(&[f64]) -> f64) -> f64 {
    rule.iter().map(|(w, x)| w * f(x)).sum()
}
