//! Arena of finite element levels shared by sweepers and transfer operators.
use crate::assembly::{
    apply_homogeneous_dirichlet_bc_csr, zero_dirichlet_rows_and_columns_csr, CsrAssembler, LocalOperator,
    UniformElementAssembler,
};
use crate::error::SdcError;
use crate::space::LagrangeSpace;
use log::debug;
use nalgebra_sparse::CsrMatrix;

/// Index of a level in a [`FeManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LevelHandle(usize);

impl LevelHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Assembled operators of a level, with homogeneous Dirichlet conditions applied.
#[derive(Debug, Clone)]
pub struct FeOperators {
    /// Mass matrix `M`, with a representative scale on Dirichlet diagonal entries.
    pub mass: CsrMatrix<f64>,
    /// Stiffness matrix `A`, with zero Dirichlet rows and columns.
    pub stiffness: CsrMatrix<f64>,
    /// First-derivative matrices `D_i`, one per spatial axis, with zero Dirichlet rows and columns.
    pub gradients: Vec<CsrMatrix<f64>>,
}

#[derive(Debug, Clone)]
pub struct FeLevel {
    space: LagrangeSpace,
    boundary_dofs: Vec<usize>,
    operators: Option<FeOperators>,
}

impl FeLevel {
    pub fn space(&self) -> &LagrangeSpace {
        &self.space
    }

    pub fn num_dofs(&self) -> usize {
        self.space.num_dofs()
    }

    pub fn boundary_dofs(&self) -> &[usize] {
        &self.boundary_dofs
    }

    pub fn is_assembled(&self) -> bool {
        self.operators.is_some()
    }

    pub fn operators(&self) -> Result<&FeOperators, SdcError> {
        self.operators
            .as_ref()
            .ok_or_else(|| SdcError::invalid_state("operators of level have not been assembled"))
    }
}

/// Owns all finite element levels of a run.
///
/// Components refer to levels through [`LevelHandle`]s instead of sharing ownership.
#[derive(Debug, Clone, Default)]
pub struct FeManager {
    levels: Vec<FeLevel>,
}

impl FeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_level(&mut self, space: LagrangeSpace) -> LevelHandle {
        let boundary_dofs = space.boundary_dofs();
        self.levels.push(FeLevel {
            space,
            boundary_dofs,
            operators: None,
        });
        LevelHandle(self.levels.len() - 1)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, handle: LevelHandle) -> Result<&FeLevel, SdcError> {
        self.levels
            .get(handle.0)
            .ok_or_else(|| SdcError::invalid_state(format!("no level with index {}", handle.0)))
    }

    /// Assembles the operators of a level, unless they are already available.
    pub fn assemble(&mut self, handle: LevelHandle) -> Result<&FeOperators, SdcError> {
        let level = self
            .levels
            .get_mut(handle.0)
            .ok_or_else(|| SdcError::invalid_state(format!("no level with index {}", handle.0)))?;

        let operators = match level.operators.take() {
            Some(operators) => operators,
            None => assemble_operators(&level.space, &level.boundary_dofs)?,
        };
        Ok(&*level.operators.insert(operators))
    }
}

fn assemble_operators(space: &LagrangeSpace, boundary_dofs: &[usize]) -> Result<FeOperators, SdcError> {
    let assembler = CsrAssembler::default();
    let assemble = |operator| -> Result<CsrMatrix<f64>, SdcError> {
        let element_assembler = UniformElementAssembler::new(space, operator)?;
        Ok(assembler.assemble(&element_assembler)?)
    };

    let mut mass = assemble(LocalOperator::Mass)?;
    let mut stiffness = assemble(LocalOperator::Stiffness)?;
    let mut gradients = (0..space.dim())
        .map(|axis| assemble(LocalOperator::Derivative(axis)))
        .collect::<Result<Vec<_>, _>>()?;

    apply_homogeneous_dirichlet_bc_csr(&mut mass, boundary_dofs);
    zero_dirichlet_rows_and_columns_csr(&mut stiffness, boundary_dofs);
    for gradient in &mut gradients {
        zero_dirichlet_rows_and_columns_csr(gradient, boundary_dofs);
    }

    debug!(
        "Assembled operators for {}D Q{} space: {} dofs, {} mass non-zeros",
        space.dim(),
        space.order(),
        space.num_dofs(),
        mass.nnz()
    );

    Ok(FeOperators {
        mass,
        stiffness,
        gradients,
    })
}
