//! Read/write trained phase models as JSON.
//!
//! The file is self-describing: it embeds the stage schema the models were
//! trained with, so prediction never depends on the running binary's schema.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::AppError;
use crate::pipeline::PhaseModels;

pub fn write_models_json(path: &Path, models: &PhaseModels) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model file '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), models)
        .map_err(|e| AppError::new(2, format!("Failed to write model file: {e}")))?;
    Ok(())
}

pub fn read_models_json(path: &Path) -> Result<PhaseModels, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model file '{}': {e}", path.display())))?;
    let models: PhaseModels = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid model file: {e}")))?;
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewProject, Phase, ProjectAttributes};
    use crate::fit::TrainOptions;
    use crate::pipeline::testing::fixture_source;
    use crate::pipeline::{PrepareOptions, predict, prepare_data, train_models};

    #[test]
    fn saved_models_predict_identically() {
        let table = prepare_data(&fixture_source(), &PrepareOptions::default()).unwrap();
        let models = train_models(&table, Phase::II, &TrainOptions::default()).unwrap();

        let path = std::env::temp_dir().join(format!("icost-models-{}.json", std::process::id()));
        write_models_json(&path, &models).unwrap();
        let loaded = read_models_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let project = NewProject {
            attributes: ProjectAttributes {
                longitud_km: 12.0,
                puentes_vehiculares_und: 1.0,
                ..ProjectAttributes::default()
            },
            scope: "Nuevo".into(),
        };
        assert_eq!(loaded.phase, Phase::II);
        let before = predict(&models, &project).unwrap();
        let after = predict(&loaded, &project).unwrap();
        assert_eq!(before.len(), after.len());
        for (category, value) in &before {
            assert!((value - after[category]).abs() <= 1e-9 * value.abs().max(1.0), "{category}");
        }
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = read_models_json(Path::new("/nonexistent/models.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
