//! Quadrature rules on hypercubes formed by tensor products of 1D rules.

use crate::univariate::gauss;
use crate::{DynRule, Rule};

/// Form the tensor product of a 1D rule with itself, `dim` times.
///
/// The first coordinate varies fastest.
pub fn tensor_product(rule1d: &Rule<1>, dim: usize) -> DynRule {
    let (weights1d, points1d) = rule1d;
    let n = weights1d.len();
    let num_points = n.pow(dim as u32);

    let mut weights = Vec::with_capacity(num_points);
    let mut points = Vec::with_capacity(dim * num_points);
    let mut multi_index = vec![0; dim];
    for _ in 0..num_points {
        let mut w = 1.0;
        for &i in &multi_index {
            w *= weights1d[i];
            points.push(points1d[i][0]);
        }
        weights.push(w);

        // Advance the multi-index, first axis fastest
        for i in multi_index.iter_mut() {
            *i += 1;
            if *i < n {
                break;
            }
            *i = 0;
        }
    }

    DynRule::from_weights_and_points(dim, weights, points)
}

/// A Gauss quadrature rule for the reference hypercube `[-1, 1]^dim`.
///
/// The rule is constructed as a tensor product from 1D rules, with the provided number of
/// points per dimension.
pub fn hypercube_gauss(dim: usize, num_points_per_dim: usize) -> DynRule {
    tensor_product(&gauss(num_points_per_dim), dim)
}

/// Like [`hypercube_gauss`], but mapped to the unit hypercube `[0, 1]^dim`.
pub fn unit_hypercube_gauss(dim: usize, num_points_per_dim: usize) -> DynRule {
    let (weights, points) = gauss(num_points_per_dim);
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|[x]| [0.5 * (x + 1.0)]).collect();
    tensor_product(&(weights, points), dim)
}
