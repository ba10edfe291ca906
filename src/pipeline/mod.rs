//! Multi-stage estimation pipeline.
//!
//! - `schema`: per-phase stage declarations and their dependency order
//! - `context`: the append-only value map of one prediction call
//! - `orchestrator`: `prepare_data`, `train_models`, `predict`

pub mod context;
pub mod orchestrator;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use context::PredictionContext;
pub use orchestrator::*;
pub use schema::{PhaseSchema, StageDecl};
