//! Run configuration.
//!
//! All structs implement `serde` traits so that runs can be described in JSON files. Every
//! field has a default, so a configuration file only needs to list the values it changes.
use crate::error::SdcError;
use crate::space::LagrangeSpace;
use fesdc_quadrature::QuadratureType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Relative tolerance for checking `t0 + num_steps * dt == t_end`.
const TIME_CONSISTENCY_TOLERANCE: f64 = 1e-10;

fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_CONSISTENCY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// (De)serializes [`QuadratureType`] through its `Display`/`FromStr` names.
mod quadrature_name {
    use fesdc_quadrature::QuadratureType;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(quadrature: &QuadratureType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(quadrature)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QuadratureType, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(D::Error::custom)
    }
}

/// Spatial discretization of one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscretizationConfig {
    pub dim: usize,
    /// Number of cells along each axis of the unit hypercube.
    pub num_elements: usize,
    pub basis_order: usize,
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            dim: 2,
            num_elements: 10,
            basis_order: 1,
        }
    }
}

impl DiscretizationConfig {
    pub fn build_space(&self) -> Result<LagrangeSpace, SdcError> {
        LagrangeSpace::unit_hypercube(self.dim, self.num_elements, self.basis_order)
    }
}

/// Time interval and step size.
///
/// Exactly one of `t_end` and `num_steps` must be given, or both must be given and agree.
///
/// Within a JSON `time` section, omitted end conditions are absent rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeConfig {
    #[serde(default)]
    pub t0: f64,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub t_end: Option<f64>,
    #[serde(default)]
    pub num_steps: Option<usize>,
}

fn default_dt() -> f64 {
    0.025
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            t0: 0.0,
            dt: default_dt(),
            t_end: Some(0.1),
            num_steps: None,
        }
    }
}

/// A validated time interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub t0: f64,
    pub dt: f64,
    pub t_end: f64,
    pub num_steps: usize,
}

impl TimeConfig {
    pub fn resolve(&self) -> Result<TimeInterval, SdcError> {
        let Self {
            t0,
            dt,
            t_end,
            num_steps,
        } = *self;
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SdcError::configuration(format!("time step must be positive, got {dt}")));
        }

        let num_steps = match (t_end, num_steps) {
            (None, None) => {
                return Err(SdcError::configuration(
                    "either the end time or the number of steps must be given",
                ))
            }
            (None, Some(n)) => n,
            (Some(t_end), n) => {
                if !(t_end > t0) {
                    return Err(SdcError::configuration(format!(
                        "end time {t_end} must be larger than start time {t0}"
                    )));
                }
                let steps = ((t_end - t0) / dt).round();
                if !almost_equal(t0 + steps * dt, t_end) {
                    return Err(SdcError::configuration(format!(
                        "interval [{t0}, {t_end}] is not a multiple of the time step {dt}"
                    )));
                }
                let steps = steps as usize;
                if let Some(n) = n {
                    if n != steps {
                        return Err(SdcError::configuration(format!(
                            "{n} steps of size {dt} from {t0} do not end at {t_end}"
                        )));
                    }
                }
                steps
            }
        };

        if num_steps == 0 {
            return Err(SdcError::configuration("at least one time step is required"));
        }

        Ok(TimeInterval {
            t0,
            dt,
            t_end: t0 + num_steps as f64 * dt,
            num_steps,
        })
    }
}

/// Tolerance and iteration cap of every conjugate gradient solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearSolverConfig {
    /// Relative residual tolerance, `||r|| <= tolerance * ||b||`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 500,
        }
    }
}

impl LinearSolverConfig {
    pub fn validate(&self) -> Result<(), SdcError> {
        if !(self.tolerance > 0.0) {
            return Err(SdcError::configuration("linear solver tolerance must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(SdcError::configuration("linear solver needs at least one iteration"));
        }
        Ok(())
    }
}

/// Stopping rule of the SDC iteration in each step.
///
/// A tolerance of zero disables the corresponding check. Iteration always stops after
/// `max_iterations` sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergenceConfig {
    pub max_iterations: usize,
    pub abs_residual_tol: f64,
    pub rel_residual_tol: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            abs_residual_tol: 0.0,
            rel_residual_tol: 0.0,
        }
    }
}

impl ConvergenceConfig {
    pub fn validate(&self) -> Result<(), SdcError> {
        if self.max_iterations == 0 {
            return Err(SdcError::configuration("at least one iteration per step is required"));
        }
        if self.abs_residual_tol < 0.0 || self.rel_residual_tol < 0.0 {
            return Err(SdcError::configuration("residual tolerances must be non-negative"));
        }
        Ok(())
    }
}

/// How the nodes of a step are initialized before the first sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predictor {
    /// Implicit-explicit Euler steps from node to node.
    ImexEuler,
    /// Copy the initial value to every node.
    Spread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweeperConfig {
    pub num_nodes: usize,
    #[serde(with = "quadrature_name")]
    pub quadrature: QuadratureType,
    pub predictor: Predictor,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            num_nodes: 3,
            quadrature: QuadratureType::UniformRight,
            predictor: Predictor::ImexEuler,
        }
    }
}

impl SweeperConfig {
    pub fn validate(&self) -> Result<(), SdcError> {
        // Builds the node set once to surface invalid node counts before any assembly
        self.quadrature.nodes(self.num_nodes)?;
        Ok(())
    }
}

/// Parameters of the model equation `u_t + v · ∇u = ν Δu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemConfig {
    pub nu: f64,
    /// Advection velocity. Without it the model is the heat equation.
    pub velocity: Option<Vec<f64>>,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            nu: 0.1,
            velocity: None,
        }
    }
}

impl ProblemConfig {
    pub fn validate(&self, dim: usize) -> Result<(), SdcError> {
        if !(self.nu > 0.0) {
            return Err(SdcError::configuration(format!("diffusion coefficient must be positive, got {}", self.nu)));
        }
        if let Some(velocity) = &self.velocity {
            SdcError::check_dimension(dim, velocity.len())?;
        }
        Ok(())
    }
}

fn from_json_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SdcError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Configuration of a single-level SDC run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SdcConfig {
    pub discretization: DiscretizationConfig,
    pub time: TimeConfig,
    pub sweeper: SweeperConfig,
    pub convergence: ConvergenceConfig,
    pub solver: LinearSolverConfig,
    pub problem: ProblemConfig,
}

impl SdcConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SdcError> {
        from_json_file(path.as_ref())
    }

    pub fn validate(&self) -> Result<TimeInterval, SdcError> {
        let interval = self.time.resolve()?;
        self.sweeper.validate()?;
        self.convergence.validate()?;
        self.solver.validate()?;
        self.problem.validate(self.discretization.dim)?;
        self.discretization.build_space()?;
        Ok(interval)
    }
}

/// How the coarse level of a two-level run is derived from the fine level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoarseLevelConfig {
    /// The fine number of elements per axis is divided by this factor.
    pub coarsening_factor: usize,
    /// Basis order of the coarse level, defaulting to the fine order.
    pub basis_order: Option<usize>,
    /// Number of coarse collocation nodes, defaulting to the fine count.
    ///
    /// The coarse nodes must be a subset of the fine nodes.
    pub num_nodes: Option<usize>,
}

impl Default for CoarseLevelConfig {
    fn default() -> Self {
        Self {
            coarsening_factor: 1,
            basis_order: None,
            num_nodes: None,
        }
    }
}

/// Configuration of a two-level MLSDC run. Fine level settings are given at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MlsdcConfig {
    pub discretization: DiscretizationConfig,
    pub coarse: CoarseLevelConfig,
    pub time: TimeConfig,
    pub sweeper: SweeperConfig,
    pub convergence: ConvergenceConfig,
    pub solver: LinearSolverConfig,
    pub problem: ProblemConfig,
}

impl MlsdcConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SdcError> {
        from_json_file(path.as_ref())
    }

    pub fn coarse_discretization(&self) -> Result<DiscretizationConfig, SdcError> {
        let factor = self.coarse.coarsening_factor;
        let fine = &self.discretization;
        if factor == 0 || fine.num_elements % factor != 0 {
            return Err(SdcError::configuration(format!(
                "coarsening factor {factor} does not divide the {} fine elements per axis",
                fine.num_elements
            )));
        }
        Ok(DiscretizationConfig {
            dim: fine.dim,
            num_elements: fine.num_elements / factor,
            basis_order: self.coarse.basis_order.unwrap_or(fine.basis_order),
        })
    }

    pub fn coarse_sweeper(&self) -> SweeperConfig {
        SweeperConfig {
            num_nodes: self.coarse.num_nodes.unwrap_or(self.sweeper.num_nodes),
            ..self.sweeper.clone()
        }
    }

    pub fn validate(&self) -> Result<TimeInterval, SdcError> {
        let interval = self.time.resolve()?;
        self.sweeper.validate()?;
        self.coarse_sweeper().validate()?;
        self.convergence.validate()?;
        self.solver.validate()?;
        self.problem.validate(self.discretization.dim)?;
        self.discretization.build_space()?;
        self.coarse_discretization()?.build_space()?;
        Ok(interval)
    }
}
