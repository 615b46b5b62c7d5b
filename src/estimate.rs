//! Error estimation in the $L^2$ norm.
use crate::error::SdcError;
use crate::space::LagrangeSpace;
use fesdc_quadrature::tensor::unit_hypercube_gauss;
use fesdc_quadrature::DynRule;
use itertools::izip;
use nalgebra::DVector;

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2}$ on a single cell with the given
/// reference quadrature rule.
#[allow(non_snake_case)]
pub fn estimate_element_L2_error_squared(
    space: &LagrangeSpace,
    cell: usize,
    u: impl Fn(&[f64]) -> f64,
    u_h: &DVector<f64>,
    rule: &DynRule,
    basis_buffer: &mut [f64],
) -> f64 {
    let element = space.element();
    let grid = space.grid();
    let jacobian_determinant = grid.cell_size().powi(space.dim() as i32);
    let dofs = space.element_dofs(cell);

    let mut result = 0.0;
    for (w, xi) in rule.iter() {
        element.populate_basis(basis_buffer, xi);
        let u_h_at_x: f64 = izip!(&dofs, basis_buffer.iter())
            .map(|(&dof, phi)| u_h[dof] * phi)
            .sum();
        let x = grid.map_reference_coords(cell, xi);
        let error = u_h_at_x - u(&x);
        result += w * error * error * jacobian_determinant;
    }
    result
}

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2}$ over the whole space.
///
/// Every cell is integrated with a tensor Gauss rule that is exact for the square of the
/// discrete solution.
#[allow(non_snake_case)]
pub fn estimate_L2_error_squared(
    space: &LagrangeSpace,
    u: impl Fn(&[f64]) -> f64,
    u_h: &DVector<f64>,
) -> Result<f64, SdcError> {
    SdcError::check_dimension(space.num_dofs(), u_h.len())?;
    let rule = unit_hypercube_gauss(space.dim(), space.order() + 2);
    let mut basis_buffer = vec![0.0; space.element().num_nodes()];
    Ok((0..space.num_cells())
        .map(|cell| estimate_element_L2_error_squared(space, cell, &u, u_h, &rule, &mut basis_buffer))
        .sum())
}

/// Estimate the $L^2$ error $\norm{u_h - u}_{L^2}$ over the whole space.
#[allow(non_snake_case)]
pub fn estimate_L2_error(
    space: &LagrangeSpace,
    u: impl Fn(&[f64]) -> f64,
    u_h: &DVector<f64>,
) -> Result<f64, SdcError> {
    Ok(estimate_L2_error_squared(space, u, u_h)?.sqrt())
}
