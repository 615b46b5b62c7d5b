use fesdc::error::SdcError;
use fesdc::mesh::UniformGrid;
use matrixcompare::assert_scalar_eq;

#[test]
fn unit_hypercube_rejects_invalid_dimensions() {
    assert!(matches!(UniformGrid::unit_hypercube(0, 4), Err(SdcError::Configuration(_))));
    assert!(matches!(UniformGrid::unit_hypercube(4, 4), Err(SdcError::Configuration(_))));
    assert!(matches!(UniformGrid::unit_hypercube(2, 0), Err(SdcError::Configuration(_))));
}

#[test]
fn cell_origin_and_reference_map() {
    let grid = UniformGrid::unit_hypercube(2, 4).unwrap();
    assert_eq!(grid.num_cells(), 16);
    assert_scalar_eq!(grid.cell_size(), 0.25);

    // Cell 6 has multi-index (2, 1)
    assert_eq!(grid.cell_multi_index(6), vec![2, 1]);
    assert_eq!(grid.cell_origin(6), vec![0.5, 0.25]);
    let x = grid.map_reference_coords(6, &[0.5, 1.0]);
    assert_scalar_eq!(x[0], 0.625, comp = abs, tol = 1e-15);
    assert_scalar_eq!(x[1], 0.5, comp = abs, tol = 1e-15);
}

#[test]
fn locate_interior_boundary_and_outside_points() {
    let grid = UniformGrid::unit_hypercube(1, 4).unwrap();

    let (cell, xi) = grid.locate(&[0.3]);
    assert_eq!(cell, 1);
    assert_scalar_eq!(xi[0], 0.2, comp = abs, tol = 1e-12);

    // Interior faces belong to the upper cell
    let (cell, xi) = grid.locate(&[0.5]);
    assert_eq!(cell, 2);
    assert_scalar_eq!(xi[0], 0.0, comp = abs, tol = 1e-12);

    // The upper boundary belongs to the last cell
    let (cell, xi) = grid.locate(&[1.0]);
    assert_eq!(cell, 3);
    assert_scalar_eq!(xi[0], 1.0, comp = abs, tol = 1e-12);

    // Points outside are clamped
    let (cell, xi) = grid.locate(&[-0.5]);
    assert_eq!(cell, 0);
    assert_scalar_eq!(xi[0], 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn locate_and_map_are_inverse() {
    let grid = UniformGrid::unit_hypercube(3, 3).unwrap();
    let point = [0.1, 0.45, 0.9];
    let (cell, xi) = grid.locate(&point);
    let mapped = grid.map_reference_coords(cell, &xi);
    for (x, y) in mapped.iter().zip(&point) {
        assert_scalar_eq!(*x, *y, comp = abs, tol = 1e-14);
    }
}
