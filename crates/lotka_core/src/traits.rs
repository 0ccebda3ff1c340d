use crate::error::SimulationError;
use crate::grid::TimeGrid;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our dynamical systems.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// An autonomous or non-autonomous first-order ODE system.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for solvers that can step a system forward by a fixed amount.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

/// Produces a sampled solution of an initial value problem.
///
/// Implementations choose their own internal step sizes; callers only pick
/// the reporting grid. The returned vector has one state per grid sample and
/// its first entry is `initial`. A failure anywhere fails the whole call.
pub trait Integrator {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        grid: &TimeGrid,
        initial: &[f64],
    ) -> Result<Vec<Vec<f64>>, SimulationError>;
}
