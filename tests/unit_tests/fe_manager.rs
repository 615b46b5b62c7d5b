use fesdc::error::SdcError;
use fesdc::fe_manager::{FeManager, LevelHandle};
use fesdc::space::LagrangeSpace;

#[test]
fn levels_are_assembled_on_demand() {
    let mut fe = FeManager::new();
    let coarse = fe.add_level(LagrangeSpace::unit_hypercube(2, 2, 1).unwrap());
    let fine = fe.add_level(LagrangeSpace::unit_hypercube(2, 4, 1).unwrap());
    assert_eq!(fe.num_levels(), 2);
    assert_ne!(coarse, fine);
    assert_eq!(fine.index(), 1);

    assert!(!fe.level(coarse).unwrap().is_assembled());
    assert!(matches!(fe.level(coarse).unwrap().operators(), Err(SdcError::InvalidState(_))));

    let operators = fe.assemble(fine).unwrap();
    assert_eq!(operators.mass.nrows(), 25);
    assert_eq!(operators.gradients.len(), 2);
    assert!(fe.level(fine).unwrap().is_assembled());
    assert!(!fe.level(coarse).unwrap().is_assembled());
}

#[test]
fn repeated_assembly_keeps_operators() {
    let mut fe = FeManager::new();
    let level = fe.add_level(LagrangeSpace::unit_hypercube(1, 5, 2).unwrap());
    let nnz = fe.assemble(level).unwrap().mass.nnz();
    let mass_values: Vec<f64> = fe.level(level).unwrap().operators().unwrap().mass.values().to_vec();
    assert_eq!(fe.assemble(level).unwrap().mass.nnz(), nnz);
    assert_eq!(fe.assemble(level).unwrap().mass.values(), &mass_values[..]);
}

#[test]
fn boundary_dofs_are_recorded_per_level() {
    let mut fe = FeManager::new();
    let level = fe.add_level(LagrangeSpace::unit_hypercube(1, 4, 1).unwrap());
    assert_eq!(fe.level(level).unwrap().boundary_dofs(), &[0, 4]);
    assert_eq!(fe.level(level).unwrap().num_dofs(), 5);
}

#[test]
fn unknown_handles_are_rejected() {
    let mut fe = FeManager::new();
    let level = fe.add_level(LagrangeSpace::unit_hypercube(1, 4, 1).unwrap());
    let mut other = FeManager::new();
    assert!(matches!(other.level(level), Err(SdcError::InvalidState(_))));
    assert!(matches!(other.assemble(level), Err(SdcError::InvalidState(_))));
    let _: LevelHandle = level;
}
