//! Historical-data collaborator seam.
//!
//! Anything that can hand over raw unit records (a CSV export, a database
//! query, a fixture) implements `HistoricalSource`. The pipeline never cares
//! where rows come from.

use crate::domain::HistoricalSample;
use crate::error::AppError;

/// Raw unit records plus the cost columns the source declares.
#[derive(Debug, Clone, Default)]
pub struct UnitRecords {
    pub cost_columns: Vec<String>,
    pub samples: Vec<HistoricalSample>,
}

pub trait HistoricalSource {
    /// Load every unit record with costs as stored (not yet indexed or weighted).
    fn load(&self) -> Result<UnitRecords, AppError>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// Records already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: UnitRecords,
}

impl MemorySource {
    pub fn new(cost_columns: &[&str], samples: Vec<HistoricalSample>) -> Self {
        Self {
            records: UnitRecords {
                cost_columns: cost_columns.iter().map(|c| c.to_string()).collect(),
                samples,
            },
        }
    }
}

impl HistoricalSource for MemorySource {
    fn load(&self) -> Result<UnitRecords, AppError> {
        if self.records.samples.is_empty() {
            return Err(AppError::new(3, "The in-memory source holds no records."));
        }
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.samples.len())
    }
}
