use thiserror::Error;

/// Errors produced while validating inputs, integrating, or sampling a field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("Parameter `{name}` is out of range (got {value}).")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Invalid time grid: {0}")]
    InvalidTimeGrid(String),

    #[error("Invalid tolerance: {0}")]
    InvalidTolerance(String),

    #[error("Integration failed at t = {time}: {reason}")]
    IntegrationFailure { time: f64, reason: String },

    #[error("Axis `{axis}` has a zero-width range at {value}.")]
    DegenerateRange { axis: &'static str, value: f64 },

    #[error("Field resolution must be at least 2 (got {0}).")]
    InvalidResolution(usize),

    #[error("Shape mismatch: expected {expected:?}, found {found:?}.")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Trajectory is empty.")]
    EmptyTrajectory,
}

/// Rejects a non-finite value under the given name.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter { name, value })
    }
}
