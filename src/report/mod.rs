//! Reporting: prediction summaries and formatted terminal output.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{NewProject, Phase};

pub mod format;

pub use format::*;

/// A prediction call's result, as printed or emitted as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub phase: Phase,
    pub project: NewProject,
    pub items: BTreeMap<String, f64>,
    pub total: f64,
}

impl PredictionReport {
    pub fn new(phase: Phase, project: &NewProject, items: BTreeMap<String, f64>) -> Self {
        let total = items.values().sum();
        Self {
            phase,
            project: project.clone(),
            items,
            total,
        }
    }
}
