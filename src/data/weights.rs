//! Length weighting of project-level costs.
//!
//! Cost items are recorded per project and repeated on every functional unit.
//! Each unit keeps the share of every cost proportional to its length within
//! the project. Projects with no recorded length split costs evenly.

use std::collections::BTreeMap;

use crate::domain::{HistoricalSample, LENGTH_COLUMN};

/// Apply length weights in place. Returns the number of projects weighted.
pub fn apply_length_weights(samples: &mut [HistoricalSample]) -> usize {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, s) in samples.iter().enumerate() {
        groups.entry(s.project_code.clone()).or_default().push(i);
    }

    for (code, members) in &groups {
        let lengths: Vec<f64> = members
            .iter()
            .map(|&i| samples[i].attributes.get(LENGTH_COLUMN).unwrap_or(0.0).max(0.0))
            .collect();
        let total: f64 = lengths.iter().sum();
        if total <= 0.0 {
            log::debug!("project {code}: no length recorded, splitting costs evenly");
        }
        for (&i, len) in members.iter().zip(&lengths) {
            let share = if total > 0.0 { len / total } else { 1.0 / members.len() as f64 };
            for value in samples[i].costs.values_mut() {
                *value *= share;
            }
        }
    }
    groups.len()
}
