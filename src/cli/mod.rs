//! Command-line parsing for the itemized cost estimator.
//!
//! Argument parsing stays separate from the modeling code: the handlers in
//! `crate::app` turn these structs into a plain `TrainConfig` / `NewProject`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{NewProject, ProjectAttributes};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "icost", version, about = "Itemized cost estimator for road design projects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train every stage of a phase, print per-category metrics and optionally save/export.
    Train(TrainArgs),
    /// Estimate every category of a phase for a new project.
    ///
    /// Uses a saved model file (`--models`) or trains in place from `--data`.
    Predict(PredictArgs),
    /// Print the stages of a phase in execution order.
    Schema(SchemaArgs),
}

/// Options shared by training and in-place prediction.
#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// Historical unit records (CSV).
    #[arg(long, env = "ICOST_DATA", value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Yearly cost increments (CSV with `anio`, `incremento`).
    #[arg(long, env = "ICOST_INCREMENTS", value_name = "CSV")]
    pub increments: Option<PathBuf>,

    /// Phase to model (II or III). Defaults to III.
    #[arg(short = 'p', long)]
    pub phase: Option<String>,

    /// Year historical costs are indexed to (defaults to the current year).
    #[arg(long)]
    pub present_year: Option<i32>,

    /// Outlier filter: ensemble, all_strict, isolation_forest, lof, robust_statistical, z_score.
    #[arg(long, default_value = "ensemble")]
    pub outlier_method: String,

    /// Expected outlier fraction for the isolation forest and LOF.
    #[arg(long, default_value_t = 0.1)]
    pub contamination: f64,

    /// Fraction of detectors that must agree in ensemble mode.
    #[arg(long, default_value_t = 0.5)]
    pub voting_threshold: f64,

    /// Seed for outlier detection, fold shuffles and synthetic samples.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Keep project-level costs as recorded on each unit.
    #[arg(long)]
    pub no_length_weighting: bool,

    /// Save trained models to JSON.
    #[arg(long = "save-models", value_name = "JSON")]
    pub save_models: Option<PathBuf>,

    /// Export per-category metrics to CSV.
    #[arg(long = "export-metrics", value_name = "CSV")]
    pub export_metrics: Option<PathBuf>,
}

/// Options for `icost predict`.
#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Saved models produced by `icost train --save-models`.
    #[arg(long, value_name = "JSON")]
    pub models: Option<PathBuf>,

    #[command(flatten)]
    pub train: TrainArgs,

    #[arg(long, default_value_t = 0.0)]
    pub longitud_km: f64,

    #[arg(long, default_value_t = 0.0)]
    pub puentes_vehiculares_und: f64,

    #[arg(long, default_value_t = 0.0)]
    pub puentes_vehiculares_mt2: f64,

    #[arg(long, default_value_t = 0.0)]
    pub puentes_peatonales_und: f64,

    #[arg(long, default_value_t = 0.0)]
    pub puentes_peatonales_mt2: f64,

    #[arg(long, default_value_t = 0.0)]
    pub tuneles_und: f64,

    #[arg(long, default_value_t = 0.0)]
    pub tuneles_km: f64,

    /// Scope label (e.g. Nuevo, Mejoramiento).
    #[arg(long, default_value = "")]
    pub scope: String,

    /// Print the estimate as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PredictArgs {
    pub fn project(&self) -> NewProject {
        NewProject {
            attributes: ProjectAttributes {
                longitud_km: self.longitud_km,
                puentes_vehiculares_und: self.puentes_vehiculares_und,
                puentes_vehiculares_mt2: self.puentes_vehiculares_mt2,
                puentes_peatonales_und: self.puentes_peatonales_und,
                puentes_peatonales_mt2: self.puentes_peatonales_mt2,
                tuneles_und: self.tuneles_und,
                tuneles_km: self.tuneles_km,
            },
            scope: self.scope.trim().to_string(),
        }
    }
}

/// Options for `icost schema`.
#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[arg(short = 'p', long, default_value = "III")]
    pub phase: String,
}
