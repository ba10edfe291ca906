//! A minimal numeric table used between data preparation and training.
//!
//! A `Frame` holds the numeric columns a stage needs (predictors + target)
//! plus the row's project code and scope label. It is deliberately not a
//! general dataframe: columns are fixed at construction and rows are only ever
//! filtered, never mutated.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub key: String,
    pub scope: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<FrameRow>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a frame from `(key, scope, values)` tuples.
    pub fn from_rows(
        columns: &[&str],
        rows: impl IntoIterator<Item = (String, String, Vec<f64>)>,
    ) -> Result<Self, AppError> {
        let mut frame = Frame::new(columns.iter().map(|c| c.to_string()).collect());
        for (key, scope, values) in rows {
            frame.push(FrameRow { key, scope, values })?;
        }
        Ok(frame)
    }

    pub fn push(&mut self, row: FrameRow) -> Result<(), AppError> {
        if row.values.len() != self.columns.len() {
            return Err(AppError::new(
                4,
                format!(
                    "Row '{}' has {} values but the frame has {} columns.",
                    row.key,
                    row.values.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, AppError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AppError::new(2, format!("Column '{name}' is not present in the training frame.")))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>, AppError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Keep rows for which `keep` returns true.
    pub fn filter(&self, mut keep: impl FnMut(&FrameRow) -> bool) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Restrict to the named columns, in the given order.
    pub fn project(&self, columns: &[&str]) -> Result<Frame, AppError> {
        let idx = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Frame {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| FrameRow {
                    key: r.key.clone(),
                    scope: r.scope.clone(),
                    values: idx.iter().map(|&i| r.values[i]).collect(),
                })
                .collect(),
        })
    }

    /// Keep rows at the given positions (in the given order).
    pub fn select(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_wrong_width() {
        let mut frame = Frame::new(vec!["a".into(), "b".into()]);
        let err = frame
            .push(FrameRow {
                key: "P".into(),
                scope: String::new(),
                values: vec![1.0],
            })
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn filter_and_select_keep_columns() {
        let frame = Frame::from_rows(
            &["x", "y"],
            vec![
                ("A".into(), "s".into(), vec![1.0, 0.0]),
                ("B".into(), "s".into(), vec![2.0, 5.0]),
            ],
        )
        .unwrap();
        let nonzero = frame.filter(|r| r.values[1] != 0.0);
        assert_eq!(nonzero.len(), 1);
        assert_eq!(nonzero.columns, frame.columns);
        assert_eq!(frame.select(&[1, 0]).rows[0].key, "B");
        assert_eq!(frame.column("x").unwrap(), vec![1.0, 2.0]);
        assert!(frame.column("z").is_err());
    }

    #[test]
    fn project_reorders_columns() {
        let frame = Frame::from_rows(&["x", "y", "z"], vec![("A".into(), "s".into(), vec![1.0, 2.0, 3.0])]).unwrap();
        let p = frame.project(&["z", "x"]).unwrap();
        assert_eq!(p.columns, vec!["z", "x"]);
        assert_eq!(p.rows[0].values, vec![3.0, 1.0]);
        assert_eq!(frame.project(&["w"]).unwrap_err().exit_code(), 2);
    }
}
