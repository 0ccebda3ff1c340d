//! Browser bindings for `lotka_core`.

pub mod model;

pub use model::WasmModel;
