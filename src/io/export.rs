//! Export the per-stage metrics report to CSV.

use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::pipeline::PhaseModels;

/// One CSV row per trained stage (failed stages get an empty metric set).
#[derive(Debug, Serialize)]
struct MetricsRow<'a> {
    phase: &'a str,
    category: &'a str,
    status: &'a str,
    regressor: &'a str,
    cv: String,
    cross_validated: bool,
    n_samples: usize,
    r2: Option<f64>,
    mae: Option<f64>,
    rmse: Option<f64>,
    mape_pct: Option<f64>,
    median_ae: Option<f64>,
    max_ae: Option<f64>,
    rmsle: Option<f64>,
    outliers_removed: usize,
    outliers_by_method: String,
    notes: String,
}

/// Write the metrics report for `models` to `path`.
pub fn write_metrics_csv(path: &Path, models: &PhaseModels) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let phase = models.phase.name();

    for m in models.ordered()? {
        let by_method: Vec<String> = m
            .outliers
            .by_detector
            .iter()
            .map(|(d, n)| format!("{}={n}", d.name()))
            .collect();
        writer
            .serialize(MetricsRow {
                phase,
                category: &m.category,
                status: "trained",
                regressor: &m.regressor,
                cv: m.cv.label(),
                cross_validated: m.cross_validated,
                n_samples: m.n_samples,
                r2: Some(m.metrics.r2).filter(|v| v.is_finite()),
                mae: Some(m.metrics.mae),
                rmse: Some(m.metrics.rmse),
                mape_pct: Some(m.metrics.mape_pct),
                median_ae: Some(m.metrics.median_ae),
                max_ae: Some(m.metrics.max_ae),
                rmsle: m.metrics.rmsle,
                outliers_removed: m.outliers.n_removed,
                outliers_by_method: by_method.join(";"),
                notes: m.warnings.join("; "),
            })
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    for f in &models.failures {
        writer
            .serialize(MetricsRow {
                phase,
                category: &f.category,
                status: "failed",
                regressor: "",
                cv: String::new(),
                cross_validated: false,
                n_samples: 0,
                r2: None,
                mae: None,
                rmse: None,
                mape_pct: None,
                median_ae: None,
                max_ae: None,
                rmsle: None,
                outliers_removed: 0,
                outliers_by_method: String::new(),
                notes: f.reason.clone(),
            })
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}
