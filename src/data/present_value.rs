//! Indexation of historical costs to present value.
//!
//! A cost recorded for a project starting in year `s` is compounded by every
//! yearly increment from `s + 1` through the present year:
//!
//! `pv = v * prod_{y = s+1}^{present} (1 + r_y)`
//!
//! Missing years contribute no growth. Tables whose largest rate exceeds `1`
//! are read as percentages.

use std::collections::BTreeMap;

use crate::domain::HistoricalSample;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementTable {
    /// Fractional yearly increments.
    rates: BTreeMap<i32, f64>,
}

impl IncrementTable {
    pub fn new(rates: BTreeMap<i32, f64>) -> Self {
        let max = rates.values().copied().fold(f64::NEG_INFINITY, f64::max);
        let rates = if max > 1.0 {
            rates.into_iter().map(|(y, r)| (y, r / 100.0)).collect()
        } else {
            rates
        };
        Self { rates }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, year: i32) -> f64 {
        self.rates.get(&year).copied().unwrap_or(0.0)
    }

    /// Growth factor from `start_year` to `present_year`; `1.0` when present is not later.
    pub fn factor(&self, start_year: i32, present_year: i32) -> f64 {
        if present_year <= start_year {
            return 1.0;
        }
        ((start_year + 1)..=present_year).map(|y| 1.0 + self.rate(y)).product()
    }

    pub fn present_value(&self, value: f64, start_year: i32, present_year: i32) -> f64 {
        value * self.factor(start_year, present_year)
    }
}

/// Index every cost of every sample with a known start year. Returns how many samples were indexed.
pub fn index_to_present(samples: &mut [HistoricalSample], table: &IncrementTable, present_year: i32) -> usize {
    let mut indexed = 0;
    for sample in samples.iter_mut() {
        let Some(start) = sample.start_year else {
            continue;
        };
        let factor = table.factor(start, present_year);
        for value in sample.costs.values_mut() {
            *value *= factor;
        }
        indexed += 1;
    }
    if indexed < samples.len() {
        log::warn!(
            "{} records have no start year; their costs were not indexed",
            samples.len() - indexed
        );
    }
    indexed
}
