pub mod equilibrium;
pub mod error;
pub mod field;
pub mod grid;
pub mod integrator;
pub mod model;
pub mod simulation;
pub mod solvers;
pub mod style;
/// The `lotka_core` crate integrates the Lotka-Volterra predator-prey model and
/// samples its phase plane.
///
/// Key components:
/// - **Model**: `Parameters`, `State`, the time derivative and the broadcasting
///   spatial derivative.
/// - **Integrators**: adaptive Tsit5 (default) and fixed-step RK4 behind the
///   `Integrator` trait.
/// - **Field**: meshgrid sampling of the direction field over a trajectory's range.
/// - **Equilibria**: fixed points with their linear stability.
pub mod traits;
pub mod trajectory;

pub use error::SimulationError;
pub use field::{sample_field, FieldSettings, PhaseField, VectorField};
pub use grid::{SpaceGrid, TimeGrid};
pub use integrator::{AdaptiveIntegrator, FixedStepIntegrator, SolverKind, Tolerance};
pub use model::{spatial_derivative, time_derivative, Parameters, State};
pub use simulation::{simulate, Simulation, SimulationConfig, SimulationReport};
pub use style::PlotStyle;
pub use trajectory::Trajectory;
