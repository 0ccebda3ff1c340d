//! Drivers that sample an ODE solution on a reporting grid.

use crate::error::{ensure_finite, SimulationError};
use crate::grid::TimeGrid;
use crate::solvers::{Tsit5, RK4};
use crate::traits::{DynamicalSystem, Integrator, Steppable};
use serde::{Deserialize, Serialize};

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;
const RELATIVE_MIN_STEP: f64 = 1e-12;

/// Local error tolerances for adaptive stepping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
        }
    }
}

impl Tolerance {
    pub fn validate(&self) -> Result<(), SimulationError> {
        for (name, value) in [("rtol", self.rtol), ("atol", self.atol)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimulationError::InvalidTolerance(format!(
                    "{name} must be finite and positive (got {value})"
                )));
            }
        }
        Ok(())
    }

    fn scale(&self, a: f64, b: f64) -> f64 {
        self.atol + self.rtol * a.abs().max(b.abs())
    }
}

/// Root-mean-square of `values[i] / scale(reference[i], other[i])`.
fn scaled_rms(values: &[f64], reference: &[f64], other: &[f64], tol: &Tolerance) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values
        .iter()
        .zip(reference.iter().zip(other))
        .map(|(v, (a, b))| {
            let r = v / tol.scale(*a, *b);
            r * r
        })
        .sum();
    (sum / values.len() as f64).sqrt()
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn check_inputs(
    system: &impl DynamicalSystem<f64>,
    grid: &TimeGrid,
    initial: &[f64],
) -> Result<(), SimulationError> {
    grid.validate()?;
    let dim = system.dimension();
    if initial.len() != dim {
        return Err(SimulationError::ShapeMismatch {
            expected: (dim, 1),
            found: (initial.len(), 1),
        });
    }
    for &value in initial {
        ensure_finite("initial_state", value)?;
    }
    Ok(())
}

/// Adaptive Tsitouras 5(4) integration with local error control.
///
/// Steps never cross a reporting time; the step that reaches one is shortened
/// to land on it exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveIntegrator {
    pub tolerance: Tolerance,
    /// Budget of attempted steps (accepted plus rejected) per call.
    pub max_steps: usize,
}

impl Default for AdaptiveIntegrator {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            max_steps: 100_000,
        }
    }
}

impl AdaptiveIntegrator {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    /// Starting step size from the magnitude of the state and its derivative,
    /// capped at `max_step` when that is positive.
    fn initial_step(
        &self,
        system: &impl DynamicalSystem<f64>,
        t: f64,
        state: &[f64],
        max_step: f64,
    ) -> f64 {
        let tol = &self.tolerance;
        let dim = state.len();
        let mut f0 = vec![0.0; dim];
        system.apply(t, state, &mut f0);

        let d0 = scaled_rms(state, state, state, tol);
        let d1 = scaled_rms(&f0, state, state, tol);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };

        let euler: Vec<f64> = state.iter().zip(&f0).map(|(y, f)| y + h0 * f).collect();
        let mut f1 = vec![0.0; dim];
        system.apply(t + h0, &euler, &mut f1);
        let diff: Vec<f64> = f1.iter().zip(&f0).map(|(a, b)| a - b).collect();
        let d2 = scaled_rms(&diff, state, state, tol) / h0;

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };
        let h = (100.0 * h0).min(h1);
        let h = if h.is_finite() && h > 0.0 { h } else { 1e-6 };
        if max_step > 0.0 {
            h.min(max_step)
        } else {
            h
        }
    }
}

impl Integrator for AdaptiveIntegrator {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        grid: &TimeGrid,
        initial: &[f64],
    ) -> Result<Vec<Vec<f64>>, SimulationError> {
        check_inputs(system, grid, initial)?;
        self.tolerance.validate()?;

        let dim = initial.len();
        let mut stepper = Tsit5::new(dim);
        let mut state = initial.to_vec();
        let mut t = grid.start;
        let mut samples = Vec::with_capacity(grid.len());
        samples.push(state.clone());

        let mut step_size: Option<f64> = None;
        let mut attempts = 0usize;
        let mut rejected = 0usize;

        for index in 1..grid.len() {
            let target = grid.at(index);
            while t < target {
                let remaining = target - t;
                let proposal = match step_size {
                    Some(h) => h,
                    None => self.initial_step(system, t, &state, grid.at(1) - grid.start),
                };
                let min_step = RELATIVE_MIN_STEP * t.abs().max(1.0);
                if !(proposal >= min_step) {
                    return Err(SimulationError::IntegrationFailure {
                        time: t,
                        reason: format!("step size {proposal:e} fell below minimum {min_step:e}"),
                    });
                }
                if attempts >= self.max_steps {
                    return Err(SimulationError::IntegrationFailure {
                        time: t,
                        reason: format!(
                            "exceeded {} steps before reaching t = {target}",
                            self.max_steps
                        ),
                    });
                }
                attempts += 1;

                let truncated = proposal >= remaining;
                let dt = if truncated { remaining } else { proposal };
                stepper.attempt(system, t, &state, dt);
                let err = scaled_rms(
                    stepper.error_estimate(),
                    &state,
                    stepper.candidate(),
                    &self.tolerance,
                );

                if !err.is_finite() || !all_finite(stepper.candidate()) {
                    rejected += 1;
                    step_size = Some(dt * MIN_FACTOR);
                    continue;
                }

                if err <= 1.0 {
                    state.copy_from_slice(stepper.candidate());
                    t = if truncated { target } else { t + dt };
                    let factor = if err == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * err.powf(ERROR_EXPONENT)).clamp(MIN_FACTOR, MAX_FACTOR)
                    };
                    step_size = Some(if truncated {
                        proposal.max(dt * factor)
                    } else {
                        dt * factor
                    });
                } else {
                    rejected += 1;
                    let factor = (SAFETY * err.powf(ERROR_EXPONENT)).max(MIN_FACTOR);
                    step_size = Some(dt * factor.min(1.0));
                }
            }
            samples.push(state.clone());
        }

        tracing::debug!(
            samples = samples.len(),
            attempts,
            rejected,
            "adaptive integration finished"
        );
        Ok(samples)
    }
}

/// Fixed-step RK4 with a set number of substeps per reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStepIntegrator {
    pub substeps: usize,
}

impl Default for FixedStepIntegrator {
    fn default() -> Self {
        Self { substeps: 10 }
    }
}

impl Integrator for FixedStepIntegrator {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        grid: &TimeGrid,
        initial: &[f64],
    ) -> Result<Vec<Vec<f64>>, SimulationError> {
        check_inputs(system, grid, initial)?;
        let substeps = self.substeps.max(1);

        let mut stepper = RK4::new(initial.len());
        let mut state = initial.to_vec();
        let mut samples = Vec::with_capacity(grid.len());
        samples.push(state.clone());

        for index in 1..grid.len() {
            let from = grid.at(index - 1);
            let target = grid.at(index);
            let dt = (target - from) / substeps as f64;
            let mut t = from;
            for _ in 0..substeps {
                stepper.step(system, &mut t, &mut state, dt);
            }
            if !all_finite(&state) {
                return Err(SimulationError::IntegrationFailure {
                    time: target,
                    reason: "state became non-finite".to_string(),
                });
            }
            samples.push(state.clone());
        }

        tracing::debug!(
            samples = samples.len(),
            substeps,
            "fixed-step integration finished"
        );
        Ok(samples)
    }
}

/// Integrator selection for configuration and bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    #[default]
    Tsit5,
    Rk4,
}

impl SolverKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tsit5" => Some(SolverKind::Tsit5),
            "rk4" => Some(SolverKind::Rk4),
            _ => None,
        }
    }

    pub fn build(self, tolerance: Tolerance) -> SolverInstance {
        match self {
            SolverKind::Tsit5 => SolverInstance::Adaptive(AdaptiveIntegrator::new(tolerance)),
            SolverKind::Rk4 => SolverInstance::Fixed(FixedStepIntegrator::default()),
        }
    }
}

/// A built integrator chosen at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolverInstance {
    Adaptive(AdaptiveIntegrator),
    Fixed(FixedStepIntegrator),
}

impl Integrator for SolverInstance {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        grid: &TimeGrid,
        initial: &[f64],
    ) -> Result<Vec<Vec<f64>>, SimulationError> {
        match self {
            SolverInstance::Adaptive(s) => s.integrate(system, grid, initial),
            SolverInstance::Fixed(s) => s.integrate(system, grid, initial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AdaptiveIntegrator, FixedStepIntegrator, SolverKind, Tolerance};
    use crate::error::SimulationError;
    use crate::grid::TimeGrid;
    use crate::traits::{DynamicalSystem, Integrator};
    use approx::assert_relative_eq;

    struct Linear {
        rate: f64,
    }

    impl DynamicalSystem<f64> for Linear {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = self.rate * x[0];
        }
    }

    /// dx/dt = x^2 blows up at t = 1 / x0.
    struct Blowup;

    impl DynamicalSystem<f64> for Blowup {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[0] * x[0];
        }
    }

    /// Harmonic oscillator, x'' = -x.
    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, SimulationError>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn adaptive_integrator_tracks_exponential_decay() {
        let grid = TimeGrid::new(0.0, 5.0, 51).expect("grid");
        let samples = AdaptiveIntegrator::default()
            .integrate(&Linear { rate: -0.7 }, &grid, &[2.0])
            .expect("integration should succeed");
        assert_eq!(samples.len(), 51);
        assert_eq!(samples[0], vec![2.0]);
        for (i, sample) in samples.iter().enumerate() {
            let expected = 2.0 * (-0.7 * grid.at(i)).exp();
            assert_relative_eq!(sample[0], expected, max_relative = 1e-4);
        }
    }

    #[test]
    fn adaptive_integrator_follows_oscillator_over_many_periods() {
        let grid = TimeGrid::new(0.0, 20.0, 201).expect("grid");
        let samples = AdaptiveIntegrator::default()
            .integrate(&Oscillator, &grid, &[1.0, 0.0])
            .expect("integration should succeed");
        let last = &samples[200];
        assert_relative_eq!(last[0], 20.0f64.cos(), epsilon = 1e-3);
        assert_relative_eq!(last[1], -(20.0f64.sin()), epsilon = 1e-3);
    }

    #[test]
    fn adaptive_integrator_handles_dense_short_grid() {
        let grid = TimeGrid::default();
        let samples = AdaptiveIntegrator::default()
            .integrate(&Linear { rate: 1.0 }, &grid, &[1.0])
            .expect("integration should succeed");
        assert_eq!(samples.len(), 1000);
        assert_relative_eq!(samples[999][0], 0.1f64.exp(), max_relative = 1e-7);
    }

    #[test]
    fn adaptive_integrator_reports_blowup_as_failure() {
        let grid = TimeGrid::new(0.0, 2.0, 11).expect("grid");
        let err = AdaptiveIntegrator::default()
            .integrate(&Blowup, &grid, &[1.0])
            .expect_err("blowup should fail");
        match err {
            SimulationError::IntegrationFailure { time, .. } => {
                assert!(time < 1.01, "failure reported well past blowup: {time}");
                assert!(time > 0.5, "failure reported too early: {time}");
            }
            other => panic!("expected integration failure, got {other:?}"),
        }
    }

    #[test]
    fn initial_step_is_capped_by_first_interval() {
        let integrator = AdaptiveIntegrator::default();
        let slow = Linear { rate: 1e-3 };
        let free = integrator.initial_step(&slow, 0.0, &[1.0], 0.0);
        assert!(free > 0.05, "expected a long unconstrained step, got {free}");
        let capped = integrator.initial_step(&slow, 0.0, &[1.0], 0.01);
        assert_eq!(capped, 0.01);
        let loose = integrator.initial_step(&slow, 0.0, &[1.0], 10.0);
        assert_eq!(loose, free);
    }

    #[test]
    fn adaptive_integrator_respects_step_budget() {
        let grid = TimeGrid::new(0.0, 100.0, 2).expect("grid");
        let mut integrator = AdaptiveIntegrator {
            max_steps: 3,
            ..AdaptiveIntegrator::default()
        };
        assert_err_contains(
            integrator.integrate(&Oscillator, &grid, &[1.0, 0.0]),
            "exceeded 3 steps",
        );
    }

    #[test]
    fn integrators_reject_invalid_inputs() {
        let grid = TimeGrid::new(0.0, 1.0, 10).expect("grid");
        let mut adaptive = AdaptiveIntegrator::default();
        assert_err_contains(
            adaptive.integrate(&Oscillator, &grid, &[1.0]),
            "Shape mismatch",
        );
        assert_err_contains(
            adaptive.integrate(&Linear { rate: 1.0 }, &grid, &[f64::NAN]),
            "initial_state",
        );
        let mut strict = AdaptiveIntegrator::new(Tolerance {
            rtol: 0.0,
            atol: 1e-9,
        });
        assert_err_contains(strict.integrate(&Linear { rate: 1.0 }, &grid, &[1.0]), "rtol");
        let reversed = TimeGrid {
            start: 1.0,
            stop: 0.0,
            count: 5,
        };
        assert_err_contains(
            FixedStepIntegrator::default().integrate(&Linear { rate: 1.0 }, &reversed, &[1.0]),
            "precedes start",
        );
    }

    #[test]
    fn fixed_step_integrator_lands_on_grid() {
        let grid = TimeGrid::new(0.0, 1.0, 11).expect("grid");
        let samples = FixedStepIntegrator { substeps: 4 }
            .integrate(&Linear { rate: -1.0 }, &grid, &[1.0])
            .expect("integration should succeed");
        assert_eq!(samples.len(), 11);
        assert_relative_eq!(samples[10][0], (-1.0f64).exp(), max_relative = 1e-7);
    }

    #[test]
    fn fixed_step_integrator_reports_non_finite_state() {
        let grid = TimeGrid::new(0.0, 5.0, 6).expect("grid");
        assert_err_contains(
            FixedStepIntegrator { substeps: 1 }.integrate(&Blowup, &grid, &[10.0]),
            "non-finite",
        );
    }

    #[test]
    fn solver_kind_parses_names() {
        assert_eq!(SolverKind::from_name("tsit5"), Some(SolverKind::Tsit5));
        assert_eq!(SolverKind::from_name("rk4"), Some(SolverKind::Rk4));
        assert_eq!(SolverKind::from_name("euler"), None);
        assert_eq!(SolverKind::default(), SolverKind::Tsit5);
    }

    #[test]
    fn solver_instances_agree_on_smooth_problem() {
        let grid = TimeGrid::new(0.0, 2.0, 21).expect("grid");
        let system = Linear { rate: 0.5 };
        let adaptive = SolverKind::Tsit5
            .build(Tolerance::default())
            .integrate(&system, &grid, &[1.0])
            .expect("tsit5");
        let fixed = SolverKind::Rk4
            .build(Tolerance::default())
            .integrate(&system, &grid, &[1.0])
            .expect("rk4");
        for (a, b) in adaptive.iter().zip(&fixed) {
            assert_relative_eq!(a[0], b[0], max_relative = 1e-5);
        }
    }
}
