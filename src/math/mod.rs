//! Mathematical utilities: linear solvers, scaling and robust statistics.

pub mod ols;
pub mod scaler;
pub mod stats;

pub use ols::*;
pub use scaler::*;
pub use stats::*;
