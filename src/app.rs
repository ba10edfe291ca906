//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments
//! - trains or loads phase models
//! - prints summaries and estimates
//! - writes optional exports

use chrono::Datelike;
use clap::Parser;

use crate::cli::{Command, PredictArgs, SchemaArgs, TrainArgs};
use crate::domain::{ATTRIBUTE_COLUMNS, NewProject, OutlierConfig, Phase, TrainConfig};
use crate::error::AppError;
use crate::pipeline::{PhaseModels, PhaseSchema};
use crate::report::PredictionReport;

pub mod pipeline;

/// Entry point for the `icost` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Train(args) => handle_train(&args),
        Command::Predict(args) => handle_predict(&args),
        Command::Schema(args) => handle_schema(&args),
    }
}

fn handle_train(args: &TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(args)?;
    let models = pipeline::run_train(&config)?;
    println!("{}", crate::report::format_training_summary(&models)?);
    Ok(())
}

fn handle_predict(args: &PredictArgs) -> Result<(), AppError> {
    let project = args.project();
    validate_project(&project)?;

    let models = match &args.models {
        Some(path) => {
            let models = crate::io::models::read_models_json(path)?;
            if let Some(phase) = &args.train.phase {
                let requested: Phase = phase.parse()?;
                if requested != models.phase {
                    return Err(AppError::new(
                        2,
                        format!(
                            "'{}' holds {} models, not phase {requested}.",
                            path.display(),
                            models.phase
                        ),
                    ));
                }
            }
            models
        }
        None => pipeline::run_train(&train_config_from_args(&args.train)?)?,
    };

    let report = estimate(&models, &project)?;
    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::new(4, format!("Failed to serialize estimate: {e}")))?;
        println!("{json}");
    } else {
        println!("{}", crate::report::format_prediction(&report, &models.schema)?);
    }
    Ok(())
}

fn handle_schema(args: &SchemaArgs) -> Result<(), AppError> {
    let phase: Phase = args.phase.parse()?;
    println!("{}", crate::report::format_schema(&PhaseSchema::for_phase(phase))?);
    Ok(())
}

/// Predict every category and wrap the result for reporting.
pub fn estimate(models: &PhaseModels, project: &NewProject) -> Result<PredictionReport, AppError> {
    let items = crate::pipeline::predict(models, project)?;
    Ok(PredictionReport::new(models.phase, project, items))
}

pub fn train_config_from_args(args: &TrainArgs) -> Result<TrainConfig, AppError> {
    let data_path = args.data.clone().ok_or_else(|| {
        AppError::new(2, "No historical data: pass --data or set ICOST_DATA.")
    })?;
    let phase = match &args.phase {
        Some(p) => p.parse()?,
        None => Phase::III,
    };
    let outlier = OutlierConfig {
        method: args.outlier_method.parse()?,
        contamination: args.contamination,
        voting_threshold: args.voting_threshold,
        seed: args.seed,
        ..OutlierConfig::default()
    };
    outlier.validate()?;

    Ok(TrainConfig {
        data_path,
        increments_path: args.increments.clone(),
        phase,
        present_year: args.present_year.unwrap_or_else(|| chrono::Local::now().year()),
        length_weighting: !args.no_length_weighting,
        outlier,
        seed: args.seed,
        save_models: args.save_models.clone(),
        export_metrics: args.export_metrics.clone(),
    })
}

fn validate_project(project: &NewProject) -> Result<(), AppError> {
    for col in ATTRIBUTE_COLUMNS {
        let value = project.attributes.get(col).unwrap_or(0.0);
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::new(2, format!("Invalid `{col}` value {value} (must be >= 0).")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cli::Cli;
    use crate::domain::OutlierMethod;

    fn train_args(extra: &[&str]) -> TrainArgs {
        let mut argv = vec!["icost", "train"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Train(args) => args,
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn config_from_flags() {
        let args = train_args(&[
            "--data",
            "units.csv",
            "--phase",
            "fase ii",
            "--present-year",
            "2024",
            "--outlier-method",
            "z-score",
            "--seed",
            "7",
        ]);
        let config = train_config_from_args(&args).unwrap();
        assert_eq!(config.data_path, PathBuf::from("units.csv"));
        assert_eq!(config.phase, Phase::II);
        assert_eq!(config.present_year, 2024);
        assert_eq!(config.outlier.method, OutlierMethod::ZScore);
        assert_eq!(config.outlier.seed, 7);
        assert!(config.length_weighting);
    }

    #[test]
    fn missing_data_is_a_configuration_error() {
        let mut args = train_args(&[]);
        args.data = None;
        assert_eq!(train_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn rejects_bad_outlier_settings() {
        let args = train_args(&["--data", "u.csv", "--outlier-method", "dbscan"]);
        assert_eq!(train_config_from_args(&args).unwrap_err().exit_code(), 2);
        let args = train_args(&["--data", "u.csv", "--contamination", "0.9"]);
        assert_eq!(train_config_from_args(&args).unwrap_err().exit_code(), 2);
        let args = train_args(&["--data", "u.csv", "--phase", "I"]);
        assert_eq!(train_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn negative_attributes_are_rejected() {
        let mut project = NewProject::default();
        project.attributes.longitud_km = -1.0;
        assert_eq!(validate_project(&project).unwrap_err().exit_code(), 2);
        assert!(validate_project(&NewProject::default()).is_ok());
    }
}
