//! Direction field sampled over the region a trajectory visits.

use crate::error::{ensure_finite, SimulationError};
use crate::grid::{linspace, AxisRange, SpaceGrid};
use crate::model::{spatial_derivative, Parameters};
use crate::trajectory::Trajectory;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// How the sample grid is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Samples per axis; the grid is `resolution x resolution`.
    pub resolution: usize,
    /// Width given to an axis the trajectory never moves along.
    /// Zero turns the widening off and makes a flat axis an error.
    pub min_span: f64,
    /// Fraction of each span added on both sides before sampling.
    pub padding: f64,
}

impl FieldSettings {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.resolution < 2 {
            return Err(SimulationError::InvalidResolution(self.resolution));
        }
        for (name, value) in [("min_span", self.min_span), ("padding", self.padding)] {
            ensure_finite(name, value)?;
            if value < 0.0 {
                return Err(SimulationError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            resolution: 20,
            min_span: 1.0,
            padding: 0.0,
        }
    }
}

/// Arrow components at each grid node, shaped like the [`SpaceGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub u: DMatrix<f64>,
    pub v: DMatrix<f64>,
}

impl VectorField {
    pub fn shape(&self) -> (usize, usize) {
        self.u.shape()
    }

    pub fn magnitudes(&self) -> DMatrix<f64> {
        self.u.zip_map(&self.v, f64::hypot)
    }

    /// Unit-length arrows. Zero vectors stay zero.
    pub fn normalized(&self) -> VectorField {
        let norms = self.magnitudes();
        let scale = |c: f64, n: f64| if n > 0.0 { c / n } else { 0.0 };
        VectorField {
            u: self.u.zip_map(&norms, scale),
            v: self.v.zip_map(&norms, scale),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseField {
    pub grid: SpaceGrid,
    pub field: VectorField,
}

fn sampling_range(
    axis: &'static str,
    range: AxisRange,
    settings: &FieldSettings,
) -> Result<AxisRange, SimulationError> {
    let range = range.padded(settings.padding);
    if range.span() > 0.0 {
        return Ok(range);
    }
    if settings.min_span > 0.0 {
        tracing::warn!(
            axis,
            value = range.min,
            min_span = settings.min_span,
            "degenerate axis range, widening about midpoint"
        );
        return Ok(range.widened(settings.min_span));
    }
    Err(SimulationError::DegenerateRange {
        axis,
        value: range.min,
    })
}

/// Builds the meshgrid over the trajectory's bounding box and evaluates the
/// direction field at every node.
pub fn sample_field(
    trajectory: &Trajectory,
    params: &Parameters,
    settings: &FieldSettings,
) -> Result<PhaseField, SimulationError> {
    settings.validate()?;
    let (x_range, y_range) = trajectory.bounds().ok_or(SimulationError::EmptyTrajectory)?;

    let x_range = sampling_range("x", x_range, settings)?;
    let y_range = sampling_range("y", y_range, settings)?;

    let x_axis = linspace(x_range.min, x_range.max, settings.resolution);
    let y_axis = linspace(y_range.min, y_range.max, settings.resolution);
    let grid = SpaceGrid::meshgrid(&x_axis, &y_axis);
    let (u, v) = spatial_derivative(&grid.xs, &grid.ys, params)?;

    Ok(PhaseField {
        grid,
        field: VectorField { u, v },
    })
}
