//! `itemized-costs` library crate.
//!
//! The binary (`icost`) is a thin wrapper around this library so that:
//!
//! - the estimation pipeline is testable without spawning processes
//! - trained phase models can be reused by other front-ends

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod metrics;
pub mod outlier;
pub mod pipeline;
pub mod report;
