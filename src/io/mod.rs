//! Input/output helpers.
//!
//! - CSV ingest of unit records and increment tables (`ingest`)
//! - metrics report export (`export`)
//! - trained model JSON read/write (`models`)

pub mod export;
pub mod ingest;
pub mod models;

pub use export::*;
pub use ingest::*;
pub use models::*;
