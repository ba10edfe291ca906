//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during training and inference
//! - embedded in saved model files
//! - exported to CSV/JSON reports

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Named modeling configuration (project stage).
///
/// Phase I (pre-feasibility) records exist in the historical data, but no
/// modeling schema is defined for it; requesting it is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Feasibility.
    #[serde(rename = "II")]
    II,
    /// Detailed design.
    #[serde(rename = "III")]
    III,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::II => "II",
            Phase::III => "III",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Phase::II => "Phase II - Feasibility",
            Phase::III => "Phase III - Detailed design",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        let key = key
            .strip_prefix("FASE ")
            .or_else(|| key.strip_prefix("PHASE "))
            .unwrap_or(&key)
            .trim()
            .to_string();
        match key.as_str() {
            "II" | "2" => Ok(Phase::II),
            "III" | "3" => Ok(Phase::III),
            _ => Err(AppError::new(
                2,
                format!("Phase '{s}' is not supported (expected one of: II, III)."),
            )),
        }
    }
}

/// Physical attribute columns, in canonical order.
pub const ATTRIBUTE_COLUMNS: [&str; 7] = [
    "longitud_km",
    "puentes_vehiculares_und",
    "puentes_vehiculares_mt2",
    "puentes_peatonales_und",
    "puentes_peatonales_mt2",
    "tuneles_und",
    "tuneles_km",
];

/// Length column used for per-unit cost weighting.
pub const LENGTH_COLUMN: &str = "longitud_km";

/// Numeric physical attributes of a project or functional unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectAttributes {
    pub longitud_km: f64,
    pub puentes_vehiculares_und: f64,
    pub puentes_vehiculares_mt2: f64,
    pub puentes_peatonales_und: f64,
    pub puentes_peatonales_mt2: f64,
    pub tuneles_und: f64,
    pub tuneles_km: f64,
}

impl ProjectAttributes {
    pub fn get(&self, column: &str) -> Option<f64> {
        match column {
            "longitud_km" => Some(self.longitud_km),
            "puentes_vehiculares_und" => Some(self.puentes_vehiculares_und),
            "puentes_vehiculares_mt2" => Some(self.puentes_vehiculares_mt2),
            "puentes_peatonales_und" => Some(self.puentes_peatonales_und),
            "puentes_peatonales_mt2" => Some(self.puentes_peatonales_mt2),
            "tuneles_und" => Some(self.tuneles_und),
            "tuneles_km" => Some(self.tuneles_km),
            _ => None,
        }
    }

    pub fn set(&mut self, column: &str, value: f64) -> bool {
        let slot = match column {
            "longitud_km" => &mut self.longitud_km,
            "puentes_vehiculares_und" => &mut self.puentes_vehiculares_und,
            "puentes_vehiculares_mt2" => &mut self.puentes_vehiculares_mt2,
            "puentes_peatonales_und" => &mut self.puentes_peatonales_und,
            "puentes_peatonales_mt2" => &mut self.puentes_peatonales_mt2,
            "tuneles_und" => &mut self.tuneles_und,
            "tuneles_km" => &mut self.tuneles_km,
            _ => return false,
        };
        *slot = value;
        true
    }

    pub fn add(&mut self, other: &ProjectAttributes) {
        for col in ATTRIBUTE_COLUMNS {
            let sum = self.get(col).unwrap_or(0.0) + other.get(col).unwrap_or(0.0);
            self.set(col, sum);
        }
    }
}

pub fn is_attribute(column: &str) -> bool {
    ATTRIBUTE_COLUMNS.contains(&column)
}

/// One historical row: a functional unit of a project with its costs.
///
/// Cost categories not applicable to the project are `0.0` (not incurred),
/// never missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample {
    pub project_code: String,
    pub unit: String,
    pub start_year: Option<i32>,
    pub scope: String,
    pub attributes: ProjectAttributes,
    pub costs: BTreeMap<String, f64>,
}

impl HistoricalSample {
    /// Look up a numeric column: physical attribute first, then cost category.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.attributes
            .get(column)
            .or_else(|| self.costs.get(column).copied())
    }

    pub fn cost(&self, category: &str) -> f64 {
        self.costs.get(category).copied().unwrap_or(0.0)
    }
}

/// A new project submitted for estimation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub attributes: ProjectAttributes,
    pub scope: String,
}

/// How the regression target is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    Identity,
    /// `ln(y)` / `exp`.
    Log,
    /// `ln(1 + y)` / `exp(y) - 1`.
    Log1p,
}

impl TargetTransform {
    pub fn forward(self, y: f64) -> f64 {
        match self {
            TargetTransform::Identity => y,
            TargetTransform::Log => y.ln(),
            TargetTransform::Log1p => y.ln_1p(),
        }
    }

    pub fn inverse(self, z: f64) -> f64 {
        match self {
            TargetTransform::Identity => z,
            TargetTransform::Log => z.exp(),
            TargetTransform::Log1p => z.exp_m1(),
        }
    }

    pub fn is_log(self) -> bool {
        !matches!(self, TargetTransform::Identity)
    }
}

/// How detector votes are combined into an inclusion decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Flag when at least `voting_threshold` of the detectors agree.
    Ensemble,
    /// Flag only when every detector agrees.
    AllStrict,
    IsolationForest,
    Lof,
    RobustStatistical,
    ZScore,
}

impl OutlierMethod {
    pub fn name(self) -> &'static str {
        match self {
            OutlierMethod::Ensemble => "ensemble",
            OutlierMethod::AllStrict => "all_strict",
            OutlierMethod::IsolationForest => "isolation_forest",
            OutlierMethod::Lof => "lof",
            OutlierMethod::RobustStatistical => "robust_statistical",
            OutlierMethod::ZScore => "z_score",
        }
    }

    /// Detectors that run for this method, in voting order.
    pub fn detectors(self) -> &'static [Detector] {
        match self {
            OutlierMethod::Ensemble | OutlierMethod::AllStrict => &[
                Detector::IsolationForest,
                Detector::LocalDensity,
                Detector::RobustZScore,
                Detector::ZScore,
            ],
            OutlierMethod::IsolationForest => &[Detector::IsolationForest],
            OutlierMethod::Lof => &[Detector::LocalDensity],
            OutlierMethod::RobustStatistical => &[Detector::RobustZScore],
            OutlierMethod::ZScore => &[Detector::ZScore],
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutlierMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ensemble" => Ok(OutlierMethod::Ensemble),
            "all_strict" => Ok(OutlierMethod::AllStrict),
            "isolation_forest" => Ok(OutlierMethod::IsolationForest),
            "lof" => Ok(OutlierMethod::Lof),
            "robust_statistical" => Ok(OutlierMethod::RobustStatistical),
            "z_score" => Ok(OutlierMethod::ZScore),
            _ => Err(AppError::new(2, format!("Unknown outlier method: {s}"))),
        }
    }
}

/// A single outlier detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    IsolationForest,
    LocalDensity,
    RobustZScore,
    ZScore,
}

impl Detector {
    pub fn name(self) -> &'static str {
        match self {
            Detector::IsolationForest => "isolation_forest",
            Detector::LocalDensity => "lof",
            Detector::RobustZScore => "robust_statistical",
            Detector::ZScore => "z_score",
        }
    }
}

/// Outlier filtering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    /// Expected outlier fraction for the isolation forest and LOF.
    pub contamination: f64,
    /// Fraction of detectors that must agree in `ensemble` mode.
    pub voting_threshold: f64,
    pub seed: u64,
    pub n_estimators: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: OutlierMethod::Ensemble,
            contamination: 0.1,
            voting_threshold: 0.5,
            seed: 42,
            n_estimators: 200,
        }
    }
}

impl OutlierConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.contamination.is_finite() && self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(AppError::new(
                2,
                format!("Invalid contamination {} (must be in (0, 0.5]).", self.contamination),
            ));
        }
        if !(self.voting_threshold.is_finite() && self.voting_threshold > 0.0 && self.voting_threshold <= 1.0) {
            return Err(AppError::new(
                2,
                format!("Invalid voting threshold {} (must be in (0, 1]).", self.voting_threshold),
            ));
        }
        if self.n_estimators == 0 {
            return Err(AppError::new(2, "Isolation forest needs at least one tree."));
        }
        Ok(())
    }
}

/// A full training run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub increments_path: Option<PathBuf>,
    pub phase: Phase,
    /// Year historical costs are indexed to.
    pub present_year: i32,
    /// Distribute project-level costs across units by length share.
    pub length_weighting: bool,
    pub outlier: OutlierConfig,
    /// Seed for fold shuffling and synthetic augmentation.
    pub seed: u64,
    pub save_models: Option<PathBuf>,
    pub export_metrics: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parses_known_names() {
        assert_eq!("III".parse::<Phase>().unwrap(), Phase::III);
        assert_eq!("fase ii".parse::<Phase>().unwrap(), Phase::II);
        assert_eq!("3".parse::<Phase>().unwrap(), Phase::III);
    }

    #[test]
    fn phase_rejects_unsupported_names() {
        let err = "I".parse::<Phase>().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("not supported"));
        assert!("IV".parse::<Phase>().is_err());
    }

    #[test]
    fn outlier_method_rejects_unknown() {
        assert_eq!("all-strict".parse::<OutlierMethod>().unwrap(), OutlierMethod::AllStrict);
        let err = "dbscan".parse::<OutlierMethod>().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn log_transforms_round_trip() {
        for t in [TargetTransform::Identity, TargetTransform::Log, TargetTransform::Log1p] {
            let y = 12_345.0;
            assert!((t.inverse(t.forward(y)) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn sample_value_prefers_attributes() {
        let mut costs = BTreeMap::new();
        costs.insert("taludes".to_string(), 5.0);
        let sample = HistoricalSample {
            project_code: "P1".into(),
            unit: "UF1".into(),
            start_year: None,
            scope: "Nuevo".into(),
            attributes: ProjectAttributes {
                longitud_km: 3.0,
                ..Default::default()
            },
            costs,
        };
        assert_eq!(sample.value("longitud_km"), Some(3.0));
        assert_eq!(sample.value("taludes"), Some(5.0));
        assert_eq!(sample.value("missing"), None);
        assert_eq!(sample.cost("missing"), 0.0);
    }
}
