//! Stage model training.
//!
//! Responsibilities:
//!
//! - derive feature rows (log terms, scope indicators)
//! - cross-validate and grid-search each regressor family (parallel)
//! - refit the winner and keep its out-of-fold record for reporting

pub mod augment;
pub mod cv;
pub mod features;
pub mod grid;
pub mod model;
pub mod regressor;
pub mod trainer;

pub use augment::Augmentation;
pub use cv::CvPolicy;
pub use features::FeatureLayout;
pub use model::StageRow;
pub use regressor::{Gamma, Hyperparams, RegressorSpec};
pub use trainer::*;
