use crate::error::SimulationError;
use crate::grid::{AxisRange, TimeGrid};
use crate::model::{conserved_quantity, Parameters, State};
use serde::{Deserialize, Serialize};

/// Sampled solution: `states[i]` is the population at `times[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<State>,
}

impl Trajectory {
    /// Pairs integrator output with the grid it was sampled on.
    pub fn from_samples(grid: &TimeGrid, samples: &[Vec<f64>]) -> Result<Self, SimulationError> {
        if samples.len() != grid.len() {
            return Err(SimulationError::ShapeMismatch {
                expected: (grid.len(), 2),
                found: (samples.len(), 2),
            });
        }
        let mut states = Vec::with_capacity(samples.len());
        for sample in samples {
            if sample.len() != 2 {
                return Err(SimulationError::ShapeMismatch {
                    expected: (grid.len(), 2),
                    found: (samples.len(), sample.len()),
                });
            }
            states.push(State::from_slice(sample));
        }
        Ok(Self {
            times: grid.values(),
            states,
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn first(&self) -> Option<State> {
        self.states.first().copied()
    }

    pub fn last(&self) -> Option<State> {
        self.states.last().copied()
    }

    /// Prey series for the time plot.
    pub fn prey(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.x).collect()
    }

    /// Predator series for the time plot.
    pub fn predator(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.y).collect()
    }

    /// Observed `(x, y)` ranges, or `None` when empty.
    pub fn bounds(&self) -> Option<(AxisRange, AxisRange)> {
        let x = AxisRange::enclosing(self.states.iter().map(|s| s.x))?;
        let y = AxisRange::enclosing(self.states.iter().map(|s| s.y))?;
        Some((x, y))
    }

    /// Largest deviation of the first integral from its starting value.
    ///
    /// `None` if any sample leaves the open positive quadrant.
    pub fn invariant_drift(&self, params: &Parameters) -> Option<f64> {
        let mut values = self
            .states
            .iter()
            .map(|s| conserved_quantity(*s, params));
        let reference = values.next()??;
        let mut drift = 0.0f64;
        for value in values {
            drift = drift.max((value? - reference).abs());
        }
        Some(drift)
    }
}
