//! End-to-end runs: validate, integrate, sample the phase plane.

use crate::equilibrium::{equilibria, Equilibrium};
use crate::error::SimulationError;
use crate::field::{sample_field, FieldSettings, PhaseField};
use crate::grid::TimeGrid;
use crate::integrator::{SolverKind, Tolerance};
use crate::model::{LotkaVolterra, Parameters, State};
use crate::traits::Integrator;
use crate::trajectory::Trajectory;
use serde::{Deserialize, Serialize};

/// Integrates the model from `initial` and samples it on `grid`.
///
/// Parameters and initial state are checked for finiteness before any
/// integration work happens.
pub fn simulate(
    params: &Parameters,
    initial: State,
    grid: &TimeGrid,
    integrator: &mut impl Integrator,
) -> Result<Trajectory, SimulationError> {
    params.validate()?;
    initial.validate()?;
    grid.validate()?;

    let system = LotkaVolterra::new(*params);
    let samples = integrator.integrate(&system, grid, &initial.to_vec())?;
    Trajectory::from_samples(grid, &samples)
}

/// Everything needed to reproduce one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub params: Parameters,
    pub initial: State,
    pub time: TimeGrid,
    pub solver: SolverKind,
    pub tolerance: Tolerance,
    pub field: FieldSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub trajectory: Trajectory,
    pub phase: PhaseField,
    pub equilibria: Vec<Equilibrium>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run(&self) -> Result<SimulationReport, SimulationError> {
        let config = &self.config;
        config.tolerance.validate()?;

        let mut solver = config.solver.build(config.tolerance);
        let trajectory = simulate(&config.params, config.initial, &config.time, &mut solver)?;
        let phase = sample_field(&trajectory, &config.params, &config.field)?;
        let equilibria = equilibria(&config.params)?;

        tracing::info!(
            solver = ?config.solver,
            samples = trajectory.len(),
            resolution = config.field.resolution,
            "simulation finished"
        );
        Ok(SimulationReport {
            trajectory,
            phase,
            equilibria,
        })
    }
}
