use crate::error::SimulationError;
use crate::model::{jacobian, Parameters, State};
use nalgebra::Matrix2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Linear stability type of a fixed point in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquilibriumKind {
    Saddle,
    Center,
    StableNode,
    UnstableNode,
    StableFocus,
    UnstableFocus,
    Degenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium {
    pub state: State,
    /// Row-major.
    pub jacobian: [[f64; 2]; 2],
    pub eigenvalues: [Complex<f64>; 2],
    pub kind: EquilibriumKind,
    /// Period of small oscillations when the linearization rotates.
    pub linear_period: Option<f64>,
}

/// `scale` is the largest Jacobian entry magnitude; thresholds follow it.
fn classify(trace: f64, det: f64, scale: f64) -> EquilibriumKind {
    let s = scale.max(1.0);
    let eps = 1e-12 * s;
    if det.abs() <= eps * s {
        return EquilibriumKind::Degenerate;
    }
    if det < 0.0 {
        return EquilibriumKind::Saddle;
    }
    if trace.abs() <= eps {
        return EquilibriumKind::Center;
    }
    let discriminant = trace * trace - 4.0 * det;
    match (discriminant < 0.0, trace < 0.0) {
        (true, true) => EquilibriumKind::StableFocus,
        (true, false) => EquilibriumKind::UnstableFocus,
        (false, true) => EquilibriumKind::StableNode,
        (false, false) => EquilibriumKind::UnstableNode,
    }
}

/// Linearizes the model at `state`.
pub fn linearize(state: State, params: &Parameters) -> Equilibrium {
    let j = jacobian(state, params);
    let matrix = Matrix2::new(j[0][0], j[0][1], j[1][0], j[1][1]);
    let trace = matrix.trace();
    let det = matrix.determinant();

    let values = matrix.complex_eigenvalues();
    let eigenvalues = [values[0], values[1]];

    let scale = matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let kind = classify(trace, det, scale);
    let linear_period = match kind {
        EquilibriumKind::Center | EquilibriumKind::StableFocus | EquilibriumKind::UnstableFocus => {
            Some(TAU / eigenvalues[0].im.abs())
        }
        _ => None,
    };

    Equilibrium {
        state,
        jacobian: j,
        eigenvalues,
        kind,
        linear_period,
    }
}

/// Fixed points of the model with their linearizations.
///
/// The extinction point is always present. The coexistence point
/// `(gamma / delta, alpha / beta)` is added when both divisors are nonzero.
pub fn equilibria(params: &Parameters) -> Result<Vec<Equilibrium>, SimulationError> {
    params.validate()?;
    let mut points = vec![State::new(0.0, 0.0)];
    if params.beta != 0.0 && params.delta != 0.0 {
        let coexistence = State::new(params.gamma / params.delta, params.alpha / params.beta);
        if coexistence != points[0] {
            points.push(coexistence);
        }
    }
    let result: Vec<Equilibrium> = points
        .into_iter()
        .map(|state| linearize(state, params))
        .collect();
    tracing::debug!(count = result.len(), "computed equilibria");
    Ok(result)
}
