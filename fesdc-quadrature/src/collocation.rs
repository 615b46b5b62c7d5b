//! Collocation node sets on the unit time interval `[0, 1]`.
//!
//! A [`CollocationNodes`] instance holds the node positions of a quadrature family together
//! with the integration matrices of the Lagrange polynomials through those nodes. These are
//! the quantities a spectral deferred correction sweeper needs to integrate right-hand side
//! values from node to node (the `S` matrix) or from the start of the step (the `Q` matrix).
use crate::univariate::{gauss, try_gauss_lobatto, try_gauss_radau};
use crate::Error;
use nalgebra::DMatrix;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Families of collocation nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuadratureType {
    /// Gauss-Legendre points, excluding both endpoints.
    GaussLegendre,
    /// Gauss-Lobatto points, including both endpoints.
    GaussLobatto,
    /// Gauss-Radau points, including the right endpoint.
    GaussRadau,
    /// Clenshaw-Curtis (Chebyshev extrema) points, including both endpoints.
    ClenshawCurtis,
    /// Equidistant points, including both endpoints.
    Uniform,
    /// Equidistant points, excluding the left endpoint and including the right endpoint.
    UniformRight,
}

impl QuadratureType {
    pub const ALL: [QuadratureType; 6] = [
        Self::GaussLegendre,
        Self::GaussLobatto,
        Self::GaussRadau,
        Self::ClenshawCurtis,
        Self::Uniform,
        Self::UniformRight,
    ];

    pub fn left_is_node(&self) -> bool {
        matches!(self, Self::GaussLobatto | Self::ClenshawCurtis | Self::Uniform)
    }

    pub fn right_is_node(&self) -> bool {
        !matches!(self, Self::GaussLegendre)
    }

    /// Node positions on `[0, 1]` in ascending order.
    pub fn nodes(&self, num_nodes: usize) -> Result<Vec<f64>, Error> {
        let n = num_nodes;
        let invalid = || Error::InvalidNodeCount {
            quadrature_type: *self,
            num_nodes,
        };
        if n < 2 {
            return Err(invalid());
        }

        let to_unit_interval =
            |points: Vec<[f64; 1]>| -> Vec<f64> { points.into_iter().map(|[x]| 0.5 * (x + 1.0)).collect() };
        let nodes: Vec<f64> = match self {
            Self::GaussLegendre => to_unit_interval(gauss(n).1),
            Self::GaussLobatto => to_unit_interval(try_gauss_lobatto(n).ok_or_else(invalid)?.1),
            Self::GaussRadau => to_unit_interval(try_gauss_radau(n).ok_or_else(invalid)?.1),
            Self::ClenshawCurtis => (0..n)
                .map(|m| 0.5 * (1.0 - (PI * m as f64 / (n - 1) as f64).cos()))
                .collect(),
            Self::Uniform => (0..n).map(|m| m as f64 / (n - 1) as f64).collect(),
            Self::UniformRight => (1..=n).map(|m| m as f64 / n as f64).collect(),
        };
        Ok(nodes)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::GaussLegendre => "gauss-legendre",
            Self::GaussLobatto => "gauss-lobatto",
            Self::GaussRadau => "gauss-radau",
            Self::ClenshawCurtis => "clenshaw-curtis",
            Self::Uniform => "uniform",
            Self::UniformRight => "uniform-right",
        }
    }
}

impl fmt::Display for QuadratureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for QuadratureType {
    type Err = Error;

    /// Parses names case-insensitively, ignoring `-`, `_` and whitespace, so that
    /// `"gauss-radau"`, `"GaussRadau"` and `"gauss_radau"` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_') && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|q| q.name().replace('-', "") == normalized)
            .ok_or_else(|| Error::UnknownQuadratureType(s.to_string()))
    }
}

/// Values of the Lagrange basis polynomials through `nodes`, evaluated at `x`.
pub fn lagrange_basis(nodes: &[f64], x: f64) -> Vec<f64> {
    nodes
        .iter()
        .enumerate()
        .map(|(j, &x_j)| {
            nodes
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != j)
                .map(|(_, &x_k)| (x - x_k) / (x_j - x_k))
                .product::<f64>()
        })
        .collect()
}

/// The matrix `L` with `L[(i, j)] = l_j(to[i])`, where `l_j` is the `j`-th Lagrange polynomial
/// through the points `from`.
///
/// Multiplying nodal values at `from` with this matrix interpolates them to the points `to`.
pub fn lagrange_interpolation_matrix(from: &[f64], to: &[f64]) -> DMatrix<f64> {
    let mut matrix = DMatrix::zeros(to.len(), from.len());
    for (i, &x) in to.iter().enumerate() {
        for (j, l_j) in lagrange_basis(from, x).into_iter().enumerate() {
            matrix[(i, j)] = l_j;
        }
    }
    matrix
}

/// Integrals `∫_a^b l_j(s) ds` of all Lagrange polynomials through `nodes`.
fn integrate_lagrange_basis(nodes: &[f64], a: f64, b: f64) -> Vec<f64> {
    // The polynomials have degree n - 1, so a Gauss rule with n points is more than enough
    let (weights, points) = gauss(nodes.len());
    let half_length = 0.5 * (b - a);
    let mut integrals = vec![0.0; nodes.len()];
    for (w, [xi]) in weights.iter().zip(points) {
        let s = a + half_length * (xi + 1.0);
        for (integral, l_j) in integrals.iter_mut().zip(lagrange_basis(nodes, s)) {
            *integral += half_length * w * l_j;
        }
    }
    integrals
}

/// Collocation nodes on `[0, 1]` with their spectral integration matrices.
///
/// Node-indexed quantities use `m = 0, ..., N - 1`. The left endpoint `τ = 0` is treated as an
/// implicit point `τ_{-1}` preceding the first node, whether or not it is itself a node.
#[derive(Debug, Clone, PartialEq)]
pub struct CollocationNodes {
    quadrature_type: QuadratureType,
    nodes: Vec<f64>,
    weights: Vec<f64>,
    q_matrix: DMatrix<f64>,
    s_matrix: DMatrix<f64>,
    delta_nodes: Vec<f64>,
}

impl CollocationNodes {
    /// Construct the node set of the given family and size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNodeCount`] if fewer than two nodes are requested.
    pub fn new(quadrature_type: QuadratureType, num_nodes: usize) -> Result<Self, Error> {
        let nodes = quadrature_type.nodes(num_nodes)?;
        let n = nodes.len();

        let mut delta_nodes = Vec::with_capacity(n);
        let mut s_matrix = DMatrix::zeros(n, n);
        let mut left = 0.0;
        for (m, &tau) in nodes.iter().enumerate() {
            delta_nodes.push(tau - left);
            for (j, integral) in integrate_lagrange_basis(&nodes, left, tau).into_iter().enumerate() {
                s_matrix[(m, j)] = integral;
            }
            left = tau;
        }

        let mut q_matrix = s_matrix.clone();
        for m in 1..n {
            for j in 0..n {
                q_matrix[(m, j)] += q_matrix[(m - 1, j)];
            }
        }

        let weights = if quadrature_type.right_is_node() {
            q_matrix.row(n - 1).iter().copied().collect()
        } else {
            integrate_lagrange_basis(&nodes, 0.0, 1.0)
        };

        Ok(Self {
            quadrature_type,
            nodes,
            weights,
            q_matrix,
            s_matrix,
            delta_nodes,
        })
    }

    pub fn quadrature_type(&self) -> QuadratureType {
        self.quadrature_type
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Quadrature weights `q_j = ∫_0^1 l_j(s) ds`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Cumulative integration matrix, `Q[(m, j)] = ∫_0^{τ_m} l_j(s) ds`.
    pub fn q_matrix(&self) -> &DMatrix<f64> {
        &self.q_matrix
    }

    /// Node-to-node integration matrix, `S[(m, j)] = ∫_{τ_{m-1}}^{τ_m} l_j(s) ds`.
    pub fn s_matrix(&self) -> &DMatrix<f64> {
        &self.s_matrix
    }

    /// Distances between consecutive nodes, `Δτ_m = τ_m - τ_{m-1}`.
    pub fn delta_nodes(&self) -> &[f64] {
        &self.delta_nodes
    }

    pub fn left_is_node(&self) -> bool {
        self.quadrature_type.left_is_node()
    }

    pub fn right_is_node(&self) -> bool {
        self.quadrature_type.right_is_node()
    }

    /// Whether all nodes of `self` are also nodes of `other`.
    ///
    /// Returns the index in `other` of each of our nodes, or `None` if some node is missing.
    pub fn embedding_in(&self, other: &CollocationNodes) -> Option<Vec<usize>> {
        self.nodes
            .iter()
            .map(|&tau| other.nodes.iter().position(|&s| (s - tau).abs() <= 1e-12))
            .collect()
    }
}
