//! Spectral deferred correction time integration for finite element discretizations of
//! parabolic problems.
//!
//! The crate provides IMEX-SDC on a single level and two-level MLSDC with FAS corrections
//! for the heat and advection-diffusion equations, discretized with tensor-product Lagrange
//! elements on uniform grids of the unit hypercube.

pub mod assembly;
pub mod config;
pub mod controller;
pub mod element;
pub mod error;
pub mod estimate;
pub mod fe_manager;
pub mod mesh;
pub mod space;
pub mod splitting;
pub mod sweeper;
pub mod transfer;

pub extern crate fesdc_quadrature as quadrature;
pub extern crate fesdc_sparse as sparse;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use config::{MlsdcConfig, SdcConfig};
pub use controller::{Controller, RunReport, Sdc, Status, StepReport, TwoLevelMlsdc};
pub use error::SdcError;
pub use fe_manager::{FeManager, LevelHandle};
pub use splitting::{AdvectionDiffusion, Heat, ImexSplitting};
pub use sweeper::ImexSweeper;
