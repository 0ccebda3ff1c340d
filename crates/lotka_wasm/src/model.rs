//! WASM wrapper around a parameterized Lotka-Volterra model.

use anyhow::{anyhow, bail, Context, Result};
use js_sys::Float64Array;
use lotka_core::equilibrium::{equilibria, EquilibriumKind};
use lotka_core::model::conserved_quantity;
use lotka_core::{
    sample_field, simulate, spatial_derivative, time_derivative, FieldSettings, Parameters,
    PlotStyle, SolverKind, State, TimeGrid, Tolerance, Trajectory,
};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmModel {
    pub(crate) params: Parameters,
    pub(crate) solver: SolverKind,
    pub(crate) tolerance: Tolerance,
    pub(crate) style: PlotStyle,
    pub(crate) field: FieldSettings,
    pub(crate) last_trajectory: Option<Trajectory>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TrajectoryPayload {
    pub times: Vec<f64>,
    pub prey: Vec<f64>,
    pub predator: Vec<f64>,
}

/// Grid and arrows flattened row-major, `rows * cols` entries each.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FieldPayload {
    pub rows: usize,
    pub cols: usize,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub normalized: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DirectionPayload {
    pub dx: Vec<f64>,
    pub dy: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EquilibriumPayload {
    pub x: f64,
    pub y: f64,
    pub kind: EquilibriumKind,
    pub eigenvalues: Vec<Complex<f64>>,
    pub linear_period: Option<f64>,
}

/// nalgebra stores column-major; plotting code indexes rows first.
pub(crate) fn row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}

fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

fn serialize<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

impl WasmModel {
    pub(crate) fn build(
        alpha: f64,
        beta: f64,
        delta: f64,
        gamma: f64,
        solver_name: &str,
    ) -> Result<WasmModel> {
        let params = Parameters::new(alpha, beta, delta, gamma);
        params.validate().context("Invalid model parameters")?;
        let solver = SolverKind::from_name(solver_name)
            .ok_or_else(|| anyhow!("Unknown solver: {solver_name}"))?;
        Ok(WasmModel {
            params,
            solver,
            tolerance: Tolerance::default(),
            style: PlotStyle::default(),
            field: FieldSettings::default(),
            last_trajectory: None,
        })
    }

    pub(crate) fn directions(&self, xs: Vec<f64>, ys: Vec<f64>) -> Result<DirectionPayload> {
        let (dx, dy) = spatial_derivative(&xs, &ys, &self.params)
            .context("Point arrays must have the same length")?;
        Ok(DirectionPayload { dx, dy })
    }

    pub(crate) fn run_simulation(
        &mut self,
        x0: f64,
        y0: f64,
        start: f64,
        stop: f64,
        count: usize,
    ) -> Result<TrajectoryPayload> {
        let grid = TimeGrid::new(start, stop, count).context("Invalid time grid")?;
        let mut integrator = self.solver.build(self.tolerance);
        let trajectory = simulate(&self.params, State::new(x0, y0), &grid, &mut integrator)
            .context("Simulation failed")?;
        let payload = TrajectoryPayload {
            times: trajectory.times().to_vec(),
            prey: trajectory.prey(),
            predator: trajectory.predator(),
        };
        self.last_trajectory = Some(trajectory);
        Ok(payload)
    }

    pub(crate) fn field_payload(&self, resolution: usize) -> Result<FieldPayload> {
        let Some(trajectory) = &self.last_trajectory else {
            bail!("Run a simulation before sampling the field.");
        };
        let settings = FieldSettings {
            resolution,
            ..self.field
        };
        let phase = sample_field(trajectory, &self.params, &settings)
            .context("Field sampling failed")?;
        let field = if self.style.normalize_arrows {
            phase.field.normalized()
        } else {
            phase.field
        };
        let (rows, cols) = phase.grid.shape();
        Ok(FieldPayload {
            rows,
            cols,
            xs: row_major(&phase.grid.xs),
            ys: row_major(&phase.grid.ys),
            u: row_major(&field.u),
            v: row_major(&field.v),
            normalized: self.style.normalize_arrows,
        })
    }

    pub(crate) fn equilibrium_payloads(&self) -> Result<Vec<EquilibriumPayload>> {
        let points = equilibria(&self.params).context("Equilibrium analysis failed")?;
        Ok(points
            .into_iter()
            .map(|eq| EquilibriumPayload {
                x: eq.state.x,
                y: eq.state.y,
                kind: eq.kind,
                eigenvalues: eq.eigenvalues.to_vec(),
                linear_period: eq.linear_period,
            })
            .collect())
    }

    /// First integral along the last trajectory; NaN where a population is not positive.
    pub(crate) fn invariant_values(&self) -> Result<Vec<f64>> {
        let trajectory = self
            .last_trajectory
            .as_ref()
            .ok_or_else(|| anyhow!("Run a simulation before evaluating the invariant."))?;
        Ok(trajectory
            .states()
            .iter()
            .map(|state| conserved_quantity(*state, &self.params).unwrap_or(f64::NAN))
            .collect())
    }

    pub(crate) fn apply_field_settings(&mut self, settings: FieldSettings) -> Result<()> {
        settings.validate().context("Invalid field settings")?;
        self.field = settings;
        Ok(())
    }

    pub(crate) fn apply_tolerance(&mut self, rtol: f64, atol: f64) -> Result<()> {
        let tolerance = Tolerance { rtol, atol };
        tolerance.validate()?;
        self.tolerance = tolerance;
        Ok(())
    }
}

#[wasm_bindgen]
impl WasmModel {
    #[wasm_bindgen(constructor)]
    pub fn new(
        alpha: f64,
        beta: f64,
        delta: f64,
        gamma: f64,
        solver_name: &str,
    ) -> Result<WasmModel, JsValue> {
        console_error_panic_hook::set_once();
        Self::build(alpha, beta, delta, gamma, solver_name).map_err(to_js_error)
    }

    /// Returns `[dx/dt, dy/dt]` at `(x, y)`.
    pub fn time_derivative(&self, x: f64, y: f64) -> Vec<f64> {
        let rate = time_derivative(State::new(x, y), &self.params);
        vec![rate.x, rate.y]
    }

    pub fn spatial_derivative(&self, xs: Vec<f64>, ys: Vec<f64>) -> Result<JsValue, JsValue> {
        let payload = self.directions(xs, ys).map_err(to_js_error)?;
        serialize(&payload)
    }

    pub fn set_tolerance(&mut self, rtol: f64, atol: f64) -> Result<(), JsValue> {
        self.apply_tolerance(rtol, atol).map_err(to_js_error)
    }

    pub fn simulate(
        &mut self,
        x0: f64,
        y0: f64,
        start: f64,
        stop: f64,
        count: usize,
    ) -> Result<JsValue, JsValue> {
        let payload = self
            .run_simulation(x0, y0, start, stop, count)
            .map_err(to_js_error)?;
        serialize(&payload)
    }

    pub fn sample_field(&self, resolution: usize) -> Result<JsValue, JsValue> {
        let payload = self.field_payload(resolution).map_err(to_js_error)?;
        serialize(&payload)
    }

    pub fn invariant_series(&self) -> Result<Float64Array, JsValue> {
        let values = self.invariant_values().map_err(to_js_error)?;
        Ok(Float64Array::from(values.as_slice()))
    }

    pub fn equilibria(&self) -> Result<JsValue, JsValue> {
        let payload = self.equilibrium_payloads().map_err(to_js_error)?;
        serialize(&payload)
    }

    pub fn set_style(&mut self, style: JsValue) -> Result<(), JsValue> {
        self.style = from_value(style)
            .map_err(|e| JsValue::from_str(&format!("Invalid plot style: {e}")))?;
        Ok(())
    }

    pub fn style(&self) -> Result<JsValue, JsValue> {
        serialize(&self.style)
    }

    /// `resolution` in the settings is overridden by the argument to `sample_field`.
    pub fn set_field_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let settings: FieldSettings = from_value(settings)
            .map_err(|e| JsValue::from_str(&format!("Invalid field settings: {e}")))?;
        self.apply_field_settings(settings).map_err(to_js_error)
    }

    pub fn field_settings(&self) -> Result<JsValue, JsValue> {
        serialize(&self.field)
    }
}
