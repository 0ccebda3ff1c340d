//! Sampling grids in time and in state space.

use crate::error::SimulationError;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Evenly spaced reporting times over `[start, stop]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeGrid {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 0.1,
            count: 1000,
        }
    }
}

impl TimeGrid {
    pub fn new(start: f64, stop: f64, count: usize) -> Result<Self, SimulationError> {
        let grid = Self { start, stop, count };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.count == 0 {
            return Err(SimulationError::InvalidTimeGrid(
                "at least one sample is required".to_string(),
            ));
        }
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(SimulationError::InvalidTimeGrid(format!(
                "bounds must be finite (got [{}, {}])",
                self.start, self.stop
            )));
        }
        if self.stop < self.start {
            return Err(SimulationError::InvalidTimeGrid(format!(
                "stop ({}) precedes start ({})",
                self.stop, self.start
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Time of the `index`-th sample. The last sample is exactly `stop`.
    pub fn at(&self, index: usize) -> f64 {
        if self.count <= 1 {
            return self.start;
        }
        if index + 1 == self.count {
            return self.stop;
        }
        let frac = index as f64 / (self.count - 1) as f64;
        self.start + (self.stop - self.start) * frac
    }

    pub fn values(&self) -> Vec<f64> {
        (0..self.count).map(|i| self.at(i)).collect()
    }
}

/// `samples` evenly spaced values from `min` to `max` inclusive.
pub fn linspace(min: f64, max: f64, samples: usize) -> Vec<f64> {
    match samples {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (samples - 1) as f64;
            (0..samples)
                .map(|i| if i + 1 == samples { max } else { min + step * i as f64 })
                .collect()
        }
    }
}

/// Closed interval observed along one state axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    /// Smallest interval containing every value, or `None` for an empty input.
    pub fn enclosing(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| match acc {
            None => Some(Self { min: v, max: v }),
            Some(r) => Some(Self {
                min: r.min.min(v),
                max: r.max.max(v),
            }),
        })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Widens the range symmetrically about its midpoint to at least `min_span`.
    pub fn widened(self, min_span: f64) -> Self {
        if self.span() >= min_span {
            return self;
        }
        let mid = self.midpoint();
        let half = 0.5 * min_span;
        Self {
            min: mid - half,
            max: mid + half,
        }
    }

    /// Extends both ends by `fraction` of the current span.
    pub fn padded(self, fraction: f64) -> Self {
        let pad = self.span() * fraction;
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }
}

/// Meshgrid coordinates: rows follow y, columns follow x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceGrid {
    pub xs: DMatrix<f64>,
    pub ys: DMatrix<f64>,
}

impl SpaceGrid {
    pub fn meshgrid(x_axis: &[f64], y_axis: &[f64]) -> Self {
        let rows = y_axis.len();
        let cols = x_axis.len();
        Self {
            xs: DMatrix::from_fn(rows, cols, |_, j| x_axis[j]),
            ys: DMatrix::from_fn(rows, cols, |i, _| y_axis[i]),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.xs.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::{linspace, AxisRange, SpaceGrid, TimeGrid};
    use approx::assert_relative_eq;

    #[test]
    fn default_time_grid_matches_reference_exercise() {
        let grid = TimeGrid::default();
        assert_eq!(grid.len(), 1000);
        let values = grid.values();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[999], 0.1);
        assert_relative_eq!(values[1] - values[0], 0.1 / 999.0, epsilon = 1e-15);
    }

    #[test]
    fn time_grid_rejects_bad_bounds() {
        assert!(TimeGrid::new(0.0, 1.0, 0).is_err());
        assert!(TimeGrid::new(1.0, 0.0, 10).is_err());
        assert!(TimeGrid::new(f64::NAN, 1.0, 10).is_err());
        assert!(TimeGrid::new(0.0, f64::INFINITY, 10).is_err());
    }

    #[test]
    fn single_sample_grid_reports_start() {
        let grid = TimeGrid::new(3.0, 7.0, 1).expect("grid");
        assert_eq!(grid.values(), vec![3.0]);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let values = linspace(-1.0, 1.0, 5);
        assert_eq!(values, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 4.0, 1), vec![2.0]);
    }

    #[test]
    fn axis_range_widening_keeps_midpoint() {
        let range = AxisRange::enclosing([5.0, 5.0, 5.0]).expect("range");
        assert_eq!(range.span(), 0.0);
        let widened = range.widened(1.0);
        assert_relative_eq!(widened.min, 4.5);
        assert_relative_eq!(widened.max, 5.5);

        let wide = AxisRange { min: 0.0, max: 3.0 };
        assert_eq!(wide.widened(1.0), wide);
        assert!(AxisRange::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn axis_range_padding_scales_with_span() {
        let padded = AxisRange { min: 2.0, max: 4.0 }.padded(0.25);
        assert_relative_eq!(padded.min, 1.5);
        assert_relative_eq!(padded.max, 4.5);
    }

    #[test]
    fn meshgrid_rows_follow_y_and_columns_follow_x() {
        let grid = SpaceGrid::meshgrid(&[0.0, 1.0, 2.0], &[10.0, 20.0]);
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.xs[(1, 2)], 2.0);
        assert_eq!(grid.ys[(1, 2)], 20.0);
        assert_eq!(grid.xs[(0, 0)], 0.0);
        assert_eq!(grid.ys[(0, 1)], 10.0);
    }
}
