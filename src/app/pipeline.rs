//! Shared "train pipeline" used by `icost train` and in-place `icost predict`.
//!
//! CSV ingest -> present-value indexing -> length weighting -> stage training
//! -> optional model/metrics export.

use crate::domain::TrainConfig;
use crate::error::AppError;
use crate::fit::TrainOptions;
use crate::io::ingest::{CsvSource, load_increments};
use crate::pipeline::{PhaseModels, PrepareOptions, prepare_data, train_models};

/// Execute the full training workflow and write the requested exports.
pub fn run_train(config: &TrainConfig) -> Result<PhaseModels, AppError> {
    let increments = config
        .increments_path
        .as_deref()
        .map(load_increments)
        .transpose()?;
    if increments.is_none() {
        log::warn!("No increments table: historical costs are used at recorded prices");
    }

    let prepare = PrepareOptions {
        present_year: config.present_year,
        increments,
        length_weighting: config.length_weighting,
    };
    let table = prepare_data(&CsvSource::new(&config.data_path), &prepare)?;

    let opts = TrainOptions {
        outlier: config.outlier.clone(),
        seed: config.seed,
    };
    let models = train_models(&table, config.phase, &opts)?;

    if let Some(path) = &config.save_models {
        crate::io::models::write_models_json(path, &models)?;
        log::info!("Saved models to {}", path.display());
    }
    if let Some(path) = &config.export_metrics {
        crate::io::export::write_metrics_csv(path, &models)?;
        log::info!("Exported metrics to {}", path.display());
    }

    Ok(models)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{OutlierConfig, Phase};

    #[test]
    fn missing_data_file_is_a_configuration_error() {
        let config = TrainConfig {
            data_path: PathBuf::from("/nonexistent/icost-units.csv"),
            increments_path: None,
            phase: Phase::III,
            present_year: 2025,
            length_weighting: true,
            outlier: OutlierConfig::default(),
            seed: 42,
            save_models: None,
            export_metrics: None,
        };
        assert_eq!(run_train(&config).unwrap_err().exit_code(), 2);
    }
}
