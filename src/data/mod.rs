//! Historical data preparation.
//!
//! - `source`: the collaborator seam that supplies raw unit records
//! - `present_value`: indexation of costs to the present year
//! - `weights`: length weighting of project-level costs across units
//! - `table` / `frame`: the prepared table and the numeric frames cut from it

pub mod frame;
pub mod present_value;
pub mod source;
pub mod table;
pub mod weights;

pub use frame::*;
pub use present_value::*;
pub use source::*;
pub use table::*;
pub use weights::*;
