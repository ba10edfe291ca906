//! Feature derivation for a stage.
//!
//! A stage's design row is built from, in order:
//!
//! - the raw predictor values
//! - `log1p(x)` for each predictor listed in `log_features`
//! - one-hot scope indicators (first level dropped; unseen levels encode as all zeros)
//!
//! The same derivation runs at training and inference time, so the encoder is
//! stored with the fitted stage.

use serde::{Deserialize, Serialize};

/// Static, per-stage feature declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub predictors: Vec<String>,
    /// Predictors additionally fed as `log1p(x)`.
    pub log_features: Vec<String>,
    /// Whether the scope label is one-hot encoded.
    pub use_scope: bool,
}

impl FeatureLayout {
    pub fn new(predictors: &[&str]) -> Self {
        Self {
            predictors: predictors.iter().map(|p| p.to_string()).collect(),
            log_features: Vec::new(),
            use_scope: false,
        }
    }

    pub fn with_log(mut self, features: &[&str]) -> Self {
        self.log_features = features.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_scope(mut self) -> Self {
        self.use_scope = true;
        self
    }
}

/// A layout with the scope levels learned from training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    layout: FeatureLayout,
    /// Indices into `predictors` for the log-augmented columns.
    log_index: Vec<usize>,
    /// Scope levels that get an indicator column (the first sorted level is dropped).
    scope_levels: Vec<String>,
}

impl FeatureEncoder {
    pub fn fit<'a>(layout: &FeatureLayout, scopes: impl IntoIterator<Item = &'a str>) -> Self {
        let log_index = layout
            .log_features
            .iter()
            .filter_map(|f| layout.predictors.iter().position(|p| p == f))
            .collect();

        let scope_levels = if layout.use_scope {
            let mut levels: Vec<String> = scopes.into_iter().map(str::to_string).collect();
            levels.sort();
            levels.dedup();
            levels.into_iter().skip(1).collect()
        } else {
            Vec::new()
        };

        Self {
            layout: layout.clone(),
            log_index,
            scope_levels,
        }
    }

    /// Encode one row. `values` are the predictor values in layout order.
    pub fn encode(&self, values: &[f64], scope: &str) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.extend_from_slice(values);
        for &i in &self.log_index {
            row.push(values[i].ln_1p());
        }
        for level in &self.scope_levels {
            row.push(if level == scope { 1.0 } else { 0.0 });
        }
        row
    }

    pub fn width(&self) -> usize {
        self.layout.predictors.len() + self.log_index.len() + self.scope_levels.len()
    }

    /// Human-readable column names, for reports.
    pub fn names(&self) -> Vec<String> {
        let mut out = self.layout.predictors.clone();
        for &i in &self.log_index {
            out.push(format!("log1p({})", self.layout.predictors[i]));
        }
        for level in &self.scope_levels {
            out.push(format!("scope={level}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_log_and_scope_columns() {
        let layout = FeatureLayout::new(&["longitud_km"]).with_log(&["longitud_km"]).with_scope();
        let enc = FeatureEncoder::fit(&layout, ["Mejoramiento", "Nuevo", "Nuevo", "Rehabilitacion"]);
        assert_eq!(enc.width(), 4);
        assert_eq!(
            enc.names(),
            vec!["longitud_km", "log1p(longitud_km)", "scope=Nuevo", "scope=Rehabilitacion"]
        );

        let row = enc.encode(&[9.0], "Nuevo");
        assert_eq!(row[0], 9.0);
        assert!((row[1] - 10f64.ln()).abs() < 1e-12);
        assert_eq!(&row[2..], &[1.0, 0.0]);

        // Dropped first level and unseen levels both encode as zeros.
        assert_eq!(&enc.encode(&[1.0], "Mejoramiento")[2..], &[0.0, 0.0]);
        assert_eq!(&enc.encode(&[1.0], "Desconocido")[2..], &[0.0, 0.0]);
    }

    #[test]
    fn scope_is_ignored_when_unused() {
        let layout = FeatureLayout::new(&["a", "b"]);
        let enc = FeatureEncoder::fit(&layout, ["x", "y"]);
        assert_eq!(enc.encode(&[1.0, 2.0], "y"), vec![1.0, 2.0]);
    }
}
