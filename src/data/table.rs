//! The prepared historical table and the per-stage frames cut from it.
//!
//! Two preparation routines exist:
//!
//! - per unit: one row per functional unit, as loaded
//! - per project: units summed by project code, optionally with merged
//!   sub-component columns, excluded project codes and a nonzero requirement
//!   on physical features (projects without bridges carry no signal for a
//!   bridge-driven category)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::frame::{Frame, FrameRow};
use crate::domain::{ATTRIBUTE_COLUMNS, HistoricalSample, ProjectAttributes, is_attribute};
use crate::error::AppError;

/// Per-project aggregation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Columns that must all be nonzero for a project to be kept.
    pub require_nonzero: Vec<String>,
    pub exclude_codes: Vec<String>,
    /// `(column, parts)`: `column` is replaced by the sum of `parts`.
    pub merge: Vec<(String, Vec<String>)>,
}

impl Aggregation {
    pub fn require_nonzero(mut self, columns: &[&str]) -> Self {
        self.require_nonzero = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn exclude(mut self, codes: &[&str]) -> Self {
        self.exclude_codes = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn merge(mut self, column: &str, parts: &[&str]) -> Self {
        self.merge
            .push((column.to_string(), parts.iter().map(|p| p.to_string()).collect()));
        self
    }

    /// Every column this aggregation reads.
    pub fn columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.require_nonzero.iter().map(String::as_str).collect();
        for (col, parts) in &self.merge {
            out.push(col);
            out.extend(parts.iter().map(String::as_str));
        }
        out
    }
}

/// How a stage's training frame is cut from the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preparation {
    #[default]
    PerUnit,
    PerProject(Aggregation),
}

impl Preparation {
    pub fn label(&self) -> &'static str {
        match self {
            Preparation::PerUnit => "per-unit",
            Preparation::PerProject(_) => "per-project",
        }
    }
}

/// Historical unit records after indexation and weighting.
#[derive(Debug, Clone, Default)]
pub struct HistoricalTable {
    pub cost_columns: Vec<String>,
    pub samples: Vec<HistoricalSample>,
}

impl HistoricalTable {
    pub fn new(cost_columns: Vec<String>, samples: Vec<HistoricalSample>) -> Self {
        Self { cost_columns, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        is_attribute(name) || self.cost_columns.iter().any(|c| c == name)
    }

    pub fn project_count(&self) -> usize {
        let mut codes: Vec<&str> = self.samples.iter().map(|s| s.project_code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        codes.len()
    }

    /// Cut a frame with `columns` using the given preparation.
    pub fn frame(&self, columns: &[&str], prep: &Preparation) -> Result<Frame, AppError> {
        self.ensure_columns(columns)?;
        match prep {
            Preparation::PerUnit => self.unit_frame(columns),
            Preparation::PerProject(agg) => {
                self.ensure_columns(&agg.columns())?;
                self.project_frame(columns, agg)
            }
        }
    }

    fn ensure_columns(&self, columns: &[&str]) -> Result<(), AppError> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(AppError::new(
                2,
                format!("Column '{missing}' is not present in the historical table."),
            )),
            None => Ok(()),
        }
    }

    fn unit_frame(&self, columns: &[&str]) -> Result<Frame, AppError> {
        Frame::from_rows(
            columns,
            self.samples.iter().map(|s| {
                (
                    format!("{}/{}", s.project_code, s.unit),
                    s.scope.clone(),
                    columns.iter().map(|c| s.value(c).unwrap_or(0.0)).collect(),
                )
            }),
        )
    }

    fn project_frame(&self, columns: &[&str], agg: &Aggregation) -> Result<Frame, AppError> {
        let mut projects: BTreeMap<&str, ProjectTotals> = BTreeMap::new();
        for s in &self.samples {
            if agg.exclude_codes.iter().any(|c| c == &s.project_code) {
                continue;
            }
            projects
                .entry(s.project_code.as_str())
                .or_insert_with(|| ProjectTotals::new(&s.scope))
                .add(s);
        }

        let mut frame = Frame::new(columns.iter().map(|c| c.to_string()).collect());
        for (code, totals) in projects {
            let mut totals = totals;
            for (col, parts) in &agg.merge {
                let sum = parts.iter().map(|p| totals.value(p)).sum();
                totals.set(col, sum);
            }
            if agg.require_nonzero.iter().any(|c| totals.value(c) == 0.0) {
                continue;
            }
            frame.push(FrameRow {
                key: code.to_string(),
                scope: totals.scope.clone(),
                values: columns.iter().map(|c| totals.value(c)).collect(),
            })?;
        }
        Ok(frame)
    }
}

/// Summed attributes and costs of one project.
struct ProjectTotals {
    scope: String,
    attributes: ProjectAttributes,
    costs: BTreeMap<String, f64>,
}

impl ProjectTotals {
    fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            attributes: ProjectAttributes::default(),
            costs: BTreeMap::new(),
        }
    }

    fn add(&mut self, sample: &HistoricalSample) {
        self.attributes.add(&sample.attributes);
        for (k, v) in &sample.costs {
            *self.costs.entry(k.clone()).or_insert(0.0) += v;
        }
    }

    fn value(&self, column: &str) -> f64 {
        self.attributes
            .get(column)
            .or_else(|| self.costs.get(column).copied())
            .unwrap_or(0.0)
    }

    fn set(&mut self, column: &str, value: f64) {
        if ATTRIBUTE_COLUMNS.contains(&column) {
            self.attributes.set(column, value);
        } else {
            self.costs.insert(column.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(code: &str, bridges: f64, geo: f64, hydro: f64) -> HistoricalSample {
        HistoricalSample {
            project_code: code.into(),
            unit: "1".into(),
            start_year: Some(2020),
            scope: "Nuevo".into(),
            attributes: ProjectAttributes {
                longitud_km: 2.0,
                puentes_vehiculares_mt2: bridges,
                ..ProjectAttributes::default()
            },
            costs: [("geologia".to_string(), geo), ("hidrogeologia".to_string(), hydro)]
                .into_iter()
                .collect(),
        }
    }

    fn table() -> HistoricalTable {
        HistoricalTable::new(
            vec!["geologia".into(), "hidrogeologia".into()],
            vec![
                unit("A", 100.0, 10.0, 1.0),
                unit("A", 50.0, 20.0, 2.0),
                unit("B", 0.0, 5.0, 0.0),
                unit("C", 30.0, 7.0, 0.5),
            ],
        )
    }

    #[test]
    fn unit_frame_keeps_every_row() {
        let f = table().frame(&["longitud_km", "geologia"], &Preparation::PerUnit).unwrap();
        assert_eq!(f.len(), 4);
        assert_eq!(f.rows[1].key, "A/1");
    }

    #[test]
    fn project_frame_sums_merges_and_filters() {
        let agg = Aggregation::default()
            .require_nonzero(&["puentes_vehiculares_mt2"])
            .merge("geologia", &["geologia", "hidrogeologia"])
            .exclude(&["C"]);
        let f = table()
            .frame(&["puentes_vehiculares_mt2", "geologia"], &Preparation::PerProject(agg))
            .unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.rows[0].key, "A");
        assert_eq!(f.rows[0].values, vec![150.0, 33.0]);
    }

    #[test]
    fn unknown_column_is_a_configuration_error() {
        let err = table().frame(&["pavimento"], &Preparation::PerUnit).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
