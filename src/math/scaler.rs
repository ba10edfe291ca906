//! Column standardization (zero mean, unit variance).

use serde::{Deserialize, Serialize};

use crate::math::stats::{mean, std_dev};

/// Per-column mean/scale learned from a training matrix.
///
/// Columns with zero variance keep a scale of `1.0` so they standardize to
/// zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on row-major data where every row has the same width.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for j in 0..width {
            let col: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            let m = mean(&col);
            let s = std_dev(&col);
            means.push(if m.is_finite() { m } else { 0.0 });
            scales.push(if s.is_finite() && s > 1e-12 { s } else { 1.0 });
        }
        Self { means, scales }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

/// Standardize a single vector on its own statistics.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let s = std_dev(values);
    let s = if s.is_finite() && s > 1e-12 { s } else { 1.0 };
    values.iter().map(|v| (v - m) / s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_centers_and_scales() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows);
        let out = scaler.transform(&rows);
        assert!((out[0][0] + 1.0).abs() < 1e-12);
        assert!((out[1][0] - 1.0).abs() < 1e-12);
        // Constant column collapses to zero.
        assert_eq!(out[0][1], 0.0);
        assert_eq!(out[1][1], 0.0);
    }
}
