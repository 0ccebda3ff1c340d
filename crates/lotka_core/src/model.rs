//! The Lotka-Volterra predator-prey equations.
//!
//! `x` is the prey population and `y` the predator population:
//!
//! ```text
//! dx/dt = x (alpha - beta y)
//! dy/dt = y (delta x - gamma)
//! ```

use crate::error::{ensure_finite, SimulationError};
use crate::traits::{DynamicalSystem, Scalar};
use nalgebra::{DMatrix, Matrix};
use serde::{Deserialize, Serialize};

/// Model coefficients, fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Prey growth rate.
    pub alpha: f64,
    /// Predation rate.
    pub beta: f64,
    /// Predator growth efficiency.
    pub delta: f64,
    /// Predator death rate.
    pub gamma: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.1,
            delta: 0.075,
            gamma: 1.5,
        }
    }
}

impl Parameters {
    pub fn new(alpha: f64, beta: f64, delta: f64, gamma: f64) -> Self {
        Self {
            alpha,
            beta,
            delta,
            gamma,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        ensure_finite("alpha", self.alpha)?;
        ensure_finite("beta", self.beta)?;
        ensure_finite("delta", self.delta)?;
        ensure_finite("gamma", self.gamma)
    }
}

/// Prey and predator populations at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub x: f64,
    pub y: f64,
}

impl Default for State {
    fn default() -> Self {
        Self { x: 10.0, y: 5.0 }
    }
}

impl State {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        ensure_finite("x_init", self.x)?;
        ensure_finite("y_init", self.y)
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.x, self.y]
    }

    pub(crate) fn from_slice(values: &[f64]) -> Self {
        Self {
            x: values[0],
            y: values[1],
        }
    }
}

/// Rate of change of each population with respect to time.
pub fn time_derivative(state: State, params: &Parameters) -> State {
    State {
        x: state.x * (params.alpha - params.beta * state.y),
        y: state.y * (params.delta * state.x - params.gamma),
    }
}

/// Values the direction field can be evaluated on elementwise.
pub trait FieldOperand: Sized {
    /// Shape as `(rows, cols)`; scalars report `(1, 1)`.
    fn shape(&self) -> (usize, usize);

    /// Combines two operands of equal shape element by element.
    fn zip_map(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self;
}

impl FieldOperand for f64 {
    fn shape(&self) -> (usize, usize) {
        (1, 1)
    }

    fn zip_map(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        f(*self, *other)
    }
}

impl FieldOperand for Vec<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.len(), 1)
    }

    fn zip_map(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        self.iter().zip(other).map(|(&a, &b)| f(a, b)).collect()
    }
}

impl FieldOperand for DMatrix<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn zip_map(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Matrix::zip_map(self, other, f)
    }
}

/// Tangent direction of the flow through `(x, y)`.
///
/// This is the time derivative read as a direction in the phase plane, so the
/// components are identical to [`time_derivative`]. Works on scalars, vectors
/// or meshgrid matrices.
pub fn spatial_derivative<A: FieldOperand>(
    x: &A,
    y: &A,
    params: &Parameters,
) -> Result<(A, A), SimulationError> {
    if x.shape() != y.shape() {
        return Err(SimulationError::ShapeMismatch {
            expected: x.shape(),
            found: y.shape(),
        });
    }
    let p = *params;
    let dx = x.zip_map(y, |x, y| time_derivative(State { x, y }, &p).x);
    let dy = x.zip_map(y, |x, y| time_derivative(State { x, y }, &p).y);
    Ok((dx, dy))
}

/// First integral `delta x - gamma ln x + beta y - alpha ln y`.
///
/// Constant along exact solutions in the positive quadrant. Returns `None`
/// when either population is not strictly positive.
pub fn conserved_quantity(state: State, params: &Parameters) -> Option<f64> {
    if state.x <= 0.0 || state.y <= 0.0 {
        return None;
    }
    Some(
        params.delta * state.x - params.gamma * state.x.ln() + params.beta * state.y
            - params.alpha * state.y.ln(),
    )
}

/// Row-major Jacobian of the vector field at `state`.
pub fn jacobian(state: State, params: &Parameters) -> [[f64; 2]; 2] {
    [
        [params.alpha - params.beta * state.y, -params.beta * state.x],
        [params.delta * state.y, params.delta * state.x - params.gamma],
    ]
}

/// The model as a two-dimensional autonomous system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotkaVolterra {
    pub params: Parameters,
}

impl LotkaVolterra {
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for LotkaVolterra {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let lift = |v: f64| T::from_f64(v).unwrap_or_else(T::nan);
        let alpha = lift(self.params.alpha);
        let beta = lift(self.params.beta);
        let delta = lift(self.params.delta);
        let gamma = lift(self.params.gamma);

        out[0] = x[0] * (alpha - beta * x[1]);
        out[1] = x[1] * (delta * x[0] - gamma);
    }
}
