use fesdc::element::LagrangeCell;
use fesdc::error::SdcError;
use matrixcompare::assert_scalar_eq;
use nalgebra::{DMatrix, DMatrixViewMut};
use proptest::prelude::*;

#[test]
fn invalid_orders_and_dimensions_are_rejected() {
    assert!(matches!(LagrangeCell::new(2, 0), Err(SdcError::Configuration(_))));
    assert!(matches!(LagrangeCell::new(0, 1), Err(SdcError::Configuration(_))));
}

#[test]
fn node_layout_is_lexicographic() {
    let cell = LagrangeCell::new(2, 2).unwrap();
    assert_eq!(cell.nodes_per_axis(), 3);
    assert_eq!(cell.num_nodes(), 9);
    assert_eq!(cell.local_multi_index(0), vec![0, 0]);
    assert_eq!(cell.local_multi_index(1), vec![1, 0]);
    assert_eq!(cell.local_multi_index(3), vec![0, 1]);
    assert_eq!(cell.node_reference_coords(5), vec![1.0, 0.5]);
}

#[test]
fn basis_is_nodal() {
    for dim in 1..=3 {
        for order in 1..=3 {
            let cell = LagrangeCell::new(dim, order).unwrap();
            let n = cell.num_nodes();
            let mut phi = vec![0.0; n];
            for i in 0..n {
                cell.populate_basis(&mut phi, &cell.node_reference_coords(i));
                for (j, &phi_j) in phi.iter().enumerate() {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_scalar_eq!(phi_j, expected, comp = abs, tol = 1e-12);
                }
            }
        }
    }
}

fn reference_point(dim: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(0.0..=1.0, dim)
}

proptest! {
    #[test]
    fn basis_is_partition_of_unity(order in 1..=3usize, xi in reference_point(2)) {
        let cell = LagrangeCell::new(2, order).unwrap();
        let mut phi = vec![0.0; cell.num_nodes()];
        cell.populate_basis(&mut phi, &xi);
        let sum: f64 = phi.iter().sum();
        prop_assert!((sum - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn basis_gradients_sum_to_zero(order in 1..=3usize, xi in reference_point(3)) {
        let cell = LagrangeCell::new(3, order).unwrap();
        let mut gradients = DMatrix::zeros(3, cell.num_nodes());
        cell.populate_basis_gradients(DMatrixViewMut::from(&mut gradients), &xi);
        for axis in 0..3 {
            let sum: f64 = gradients.row(axis).iter().sum();
            prop_assert!(sum.abs() <= 1e-10);
        }
    }

    #[test]
    fn basis_gradients_match_finite_differences(xi in proptest::collection::vec(0.1..0.9, 2)) {
        let cell = LagrangeCell::new(2, 2).unwrap();
        let n = cell.num_nodes();
        let mut gradients = DMatrix::zeros(2, n);
        cell.populate_basis_gradients(DMatrixViewMut::from(&mut gradients), &xi);

        let h = 1e-6;
        let mut phi_plus = vec![0.0; n];
        let mut phi_minus = vec![0.0; n];
        for axis in 0..2 {
            let mut plus = xi.clone();
            let mut minus = xi.clone();
            plus[axis] += h;
            minus[axis] -= h;
            cell.populate_basis(&mut phi_plus, &plus);
            cell.populate_basis(&mut phi_minus, &minus);
            for i in 0..n {
                let fd = (phi_plus[i] - phi_minus[i]) / (2.0 * h);
                prop_assert!((fd - gradients[(axis, i)]).abs() <= 1e-6);
            }
        }
    }
}
