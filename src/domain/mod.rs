//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - phases, physical attributes and historical samples
//! - target transforms and outlier-filter configuration
//! - the run configuration (`TrainConfig`)

pub mod types;

pub use types::*;
