//! Regression accuracy metrics.
//!
//! All metrics are computed in the units of the inputs; the trainer always
//! passes original cost units (never log space).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::median_mut;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub n: usize,
    /// Coefficient of determination. `NaN` with fewer than two samples.
    #[serde(with = "nan_as_null")]
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error, in percent.
    pub mape_pct: f64,
    pub median_ae: f64,
    pub max_ae: f64,
    /// Root mean squared log error (`log1p` on both sides), when requested.
    pub rmsle: Option<f64>,
}

/// Compute the metric set for paired true/predicted values.
///
/// Preconditions (violations are errors, never silently patched):
/// - equal, non-zero lengths
/// - every `y_true` non-zero (MAPE)
/// - with `include_log_error`, every value greater than `-1`
pub fn compute(y_true: &[f64], y_pred: &[f64], include_log_error: bool) -> Result<Metrics, AppError> {
    if y_true.len() != y_pred.len() {
        return Err(AppError::new(
            4,
            format!("Metric inputs differ in length: {} vs {}.", y_true.len(), y_pred.len()),
        ));
    }
    if y_true.is_empty() {
        return Err(AppError::new(3, "Cannot compute metrics on an empty sample."));
    }
    if y_true.iter().any(|&y| y == 0.0) {
        return Err(AppError::new(
            4,
            "MAPE requires non-zero true values; zero targets must be filtered first.",
        ));
    }

    let n = y_true.len();
    let nf = n as f64;
    let mut abs_err: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).collect();

    let sse: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).sum();
    let mae = abs_err.iter().sum::<f64>() / nf;
    let rmse = (sse / nf).sqrt();
    let mape_pct = 100.0 * y_true.iter().zip(&abs_err).map(|(t, e)| e / t.abs()).sum::<f64>() / nf;
    let max_ae = abs_err.iter().copied().max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal)).unwrap_or(0.0);
    let median_ae = median_mut(&mut abs_err).unwrap_or(0.0);

    let rmsle = if include_log_error {
        if y_true.iter().chain(y_pred).any(|&v| v <= -1.0) {
            return Err(AppError::new(4, "RMSLE requires values greater than -1."));
        }
        let sq: f64 = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| {
                let d = t.ln_1p() - p.ln_1p();
                d * d
            })
            .sum();
        Some((sq / nf).sqrt())
    } else {
        None
    };

    Ok(Metrics {
        n,
        r2: r_squared(y_true, sse),
        mae,
        rmse,
        mape_pct,
        median_ae,
        max_ae,
        rmsle,
    })
}

/// JSON has no NaN; an undefined value is stored as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() { s.serialize_some(value) } else { s.serialize_none() }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

fn r_squared(y_true: &[f64], sse: f64) -> f64 {
    if y_true.len() < 2 {
        return f64::NAN;
    }
    let m = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let sst: f64 = y_true.iter().map(|y| (y - m) * (y - m)).sum();
    if sst == 0.0 {
        // Constant target: perfect predictions score 1, anything else 0.
        return if sse == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - sse / sst
}
