//! Per-call prediction state.

use std::collections::BTreeMap;

use crate::error::AppError;

/// Category values produced so far during one `predict` call.
///
/// Append-only: a category is written once, and reading a category that has
/// not been produced yet is an ordering violation (exit code 5), never a zero.
#[derive(Debug, Default)]
pub struct PredictionContext {
    values: BTreeMap<String, f64>,
}

impl PredictionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: &str, value: f64) -> Result<(), AppError> {
        if self.values.contains_key(category) {
            return Err(AppError::new(
                5,
                format!("Category '{category}' was predicted twice in one call."),
            ));
        }
        self.values.insert(category.to_string(), value);
        Ok(())
    }

    pub fn get(&self, category: &str) -> Result<f64, AppError> {
        self.values.get(category).copied().ok_or_else(|| {
            AppError::new(
                5,
                format!("Category '{category}' was read before its stage produced a value."),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, f64> {
        self.values
    }
}
