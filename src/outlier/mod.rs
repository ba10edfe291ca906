//! Outlier rejection before stage training.
//!
//! For a given `(frame, target)` pair the filter:
//!
//! 1. drops rows whose target is exactly zero (category not incurred)
//! 2. returns early when fewer than `MIN_DETECTION_SAMPLES` rows remain
//! 3. standardizes every numeric column
//! 4. runs the enabled detectors and combines their votes
//!
//! Votes are recomputed on every call; each category filters its own subset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::Frame;
use crate::domain::{Detector, OutlierConfig, OutlierMethod};
use crate::error::AppError;
use crate::math::{StandardScaler, percentile};

pub mod isolation;
pub mod lof;
pub mod zscore;

/// Below this many nonzero samples, statistical detection is skipped.
pub const MIN_DETECTION_SAMPLES: usize = 10;

/// Largest LOF neighbourhood.
const LOF_MAX_NEIGHBOURS: usize = 20;

/// Audit trail of one filter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub method: OutlierMethod,
    pub n_zero_dropped: usize,
    /// Rows entering detection (after the zero filter).
    pub n_candidates: usize,
    pub n_removed: usize,
    /// True when detection was skipped by the small-sample guard.
    pub skipped: bool,
    /// Flag count per detector (before combination).
    pub by_detector: BTreeMap<Detector, usize>,
}

/// Cleaned frame plus audit summary.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub cleaned: Frame,
    pub summary: OutlierSummary,
}

/// Remove zero-target rows and statistical outliers for `target`.
pub fn filter_outliers(frame: &Frame, target: &str, config: &OutlierConfig) -> Result<FilterOutcome, AppError> {
    config.validate()?;
    let t = frame.column_index(target)?;

    let nonzero = frame.filter(|row| row.values[t] != 0.0);
    let n_zero_dropped = frame.len() - nonzero.len();
    let n = nonzero.len();

    if n < MIN_DETECTION_SAMPLES {
        log::warn!("  {target}: only {n} samples, skipping outlier detection");
        return Ok(FilterOutcome {
            cleaned: nonzero,
            summary: OutlierSummary {
                method: config.method,
                n_zero_dropped,
                n_candidates: n,
                n_removed: 0,
                skipped: true,
                by_detector: BTreeMap::new(),
            },
        });
    }

    let raw: Vec<Vec<f64>> = nonzero.rows.iter().map(|r| r.values.clone()).collect();
    let scaled = StandardScaler::fit(&raw).transform(&raw);
    let target_values: Vec<f64> = raw.iter().map(|r| r[t]).collect();

    let votes = run_detectors(config.method.detectors(), &scaled, &target_values, config);
    let is_outlier = combine(config.method, &votes, config.voting_threshold);

    let keep: Vec<usize> = (0..n).filter(|&i| !is_outlier[i]).collect();
    let cleaned = nonzero.select(&keep);
    let n_removed = n - keep.len();

    let by_detector: BTreeMap<Detector, usize> = votes
        .iter()
        .map(|(d, flags)| (*d, flags.iter().filter(|f| **f).count()))
        .collect();

    log::info!(
        "  {target}: removed {n_removed}/{n} outliers ({:.1}%) using {}",
        100.0 * n_removed as f64 / n as f64,
        config.method
    );
    if votes.len() > 1 {
        for (d, count) in &by_detector {
            log::info!("     - {}: {count} flagged", d.name());
        }
    }

    Ok(FilterOutcome {
        cleaned,
        summary: OutlierSummary {
            method: config.method,
            n_zero_dropped,
            n_candidates: n,
            n_removed,
            skipped: false,
            by_detector,
        },
    })
}

/// Run each detector and return its per-row flags, in detector order.
pub fn run_detectors(
    detectors: &[Detector],
    scaled: &[Vec<f64>],
    target: &[f64],
    config: &OutlierConfig,
) -> Vec<(Detector, Vec<bool>)> {
    detectors
        .iter()
        .map(|&d| {
            let flags = match d {
                Detector::IsolationForest => {
                    let scores = isolation::anomaly_scores(scaled, config.n_estimators, config.seed);
                    below_contamination(&negate(&scores), config.contamination)
                }
                Detector::LocalDensity => {
                    let k = LOF_MAX_NEIGHBOURS.min(scaled.len().saturating_sub(1));
                    let factors = lof::local_outlier_factors(scaled, k);
                    below_contamination(&negate(&factors), config.contamination)
                }
                Detector::RobustZScore => zscore::robust_flags(target),
                Detector::ZScore => zscore::zscore_flags(target),
            };
            (d, flags)
        })
        .collect()
}

/// Combine detector votes into a final outlier decision per row.
pub fn combine(method: OutlierMethod, votes: &[(Detector, Vec<bool>)], voting_threshold: f64) -> Vec<bool> {
    let n = votes.first().map(|(_, f)| f.len()).unwrap_or(0);
    let enabled = votes.len() as f64;
    (0..n)
        .map(|i| {
            let count = votes.iter().filter(|(_, flags)| flags[i]).count();
            match method {
                OutlierMethod::Ensemble => count as f64 >= enabled * voting_threshold,
                OutlierMethod::AllStrict => count == votes.len(),
                _ => count > 0,
            }
        })
        .collect()
}

/// Flag values strictly below the `contamination` percentile.
fn below_contamination(values: &[f64], contamination: f64) -> Vec<bool> {
    let Some(offset) = percentile(values, 100.0 * contamination) else {
        return Vec::new();
    };
    values.iter().map(|&v| v < offset).collect()
}

fn negate(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| -v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(targets: &[f64]) -> Frame {
        Frame::from_rows(
            &["longitud_km", "cost"],
            targets.iter().enumerate().map(|(i, &y)| {
                (
                    format!("P{i}"),
                    "Nuevo".to_string(),
                    vec![1.0 + i as f64 * 0.5, y],
                )
            }),
        )
        .unwrap()
    }

    fn realistic_targets() -> Vec<f64> {
        let mut y: Vec<f64> = (0..24).map(|i| 1000.0 + 40.0 * i as f64 + (i % 3) as f64 * 15.0).collect();
        y[5] = 0.0;
        y[11] = 0.0;
        y.push(250_000.0);
        y
    }

    #[test]
    fn zero_targets_are_always_dropped() {
        let frame = frame_with(&realistic_targets());
        let out = filter_outliers(&frame, "cost", &OutlierConfig::default()).unwrap();
        assert_eq!(out.summary.n_zero_dropped, 2);
        assert!(out.cleaned.rows.iter().all(|r| r.values[1] != 0.0));
    }

    #[test]
    fn ensemble_removes_injected_outlier() {
        let frame = frame_with(&realistic_targets());
        let out = filter_outliers(&frame, "cost", &OutlierConfig::default()).unwrap();
        assert!(out.cleaned.rows.iter().all(|r| r.values[1] < 100_000.0));
        assert!(out.summary.n_removed >= 1);
        assert_eq!(out.summary.by_detector.len(), 4);
    }

    #[test]
    fn filter_is_deterministic() {
        let frame = frame_with(&realistic_targets());
        let cfg = OutlierConfig::default();
        let a = filter_outliers(&frame, "cost", &cfg).unwrap();
        let b = filter_outliers(&frame, "cost", &cfg).unwrap();
        assert_eq!(a.cleaned, b.cleaned);
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn zero_filter_is_idempotent() {
        let frame = frame_with(&[0.0, 10.0, 0.0, 12.0, 11.0]);
        let cfg = OutlierConfig::default();
        let once = filter_outliers(&frame, "cost", &cfg).unwrap().cleaned;
        let twice = filter_outliers(&once, "cost", &cfg).unwrap().cleaned;
        assert_eq!(once, twice);
    }

    #[test]
    fn small_samples_pass_through_unchanged() {
        let targets = [0.0, 100.0, 150.0, 90_000.0, 120.0, 0.0, 130.0, 110.0, 140.0, 105.0, 95.0];
        let frame = frame_with(&targets);
        let expected = frame.filter(|r| r.values[1] != 0.0);
        assert_eq!(expected.len(), 9);

        let out = filter_outliers(&frame, "cost", &OutlierConfig::default()).unwrap();
        assert!(out.summary.skipped);
        assert_eq!(out.cleaned, expected);
    }

    #[test]
    fn raising_voting_threshold_never_flags_more() {
        let frame = frame_with(&realistic_targets());
        let mut previous = usize::MAX;
        for threshold in [0.25, 0.5, 0.75, 1.0] {
            let cfg = OutlierConfig {
                voting_threshold: threshold,
                ..OutlierConfig::default()
            };
            let removed = filter_outliers(&frame, "cost", &cfg).unwrap().summary.n_removed;
            assert!(removed <= previous, "threshold {threshold} removed {removed} > {previous}");
            previous = removed;
        }
    }

    #[test]
    fn all_strict_is_no_looser_than_ensemble() {
        let frame = frame_with(&realistic_targets());
        let ensemble = filter_outliers(&frame, "cost", &OutlierConfig::default()).unwrap();
        let strict = filter_outliers(
            &frame,
            "cost",
            &OutlierConfig {
                method: OutlierMethod::AllStrict,
                ..OutlierConfig::default()
            },
        )
        .unwrap();
        assert!(strict.summary.n_removed <= ensemble.summary.n_removed);
    }

    #[test]
    fn single_method_uses_only_that_detector() {
        let frame = frame_with(&realistic_targets());
        let out = filter_outliers(
            &frame,
            "cost",
            &OutlierConfig {
                method: OutlierMethod::RobustStatistical,
                ..OutlierConfig::default()
            },
        )
        .unwrap();
        assert_eq!(out.summary.by_detector.len(), 1);
        assert!(out.summary.by_detector.contains_key(&Detector::RobustZScore));
        assert_eq!(out.summary.n_removed, 1);
    }

    #[test]
    fn invalid_contamination_is_a_configuration_error() {
        let frame = frame_with(&realistic_targets());
        let err = filter_outliers(
            &frame,
            "cost",
            &OutlierConfig {
                contamination: 0.9,
                ..OutlierConfig::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn combine_counts_votes() {
        let votes = vec![
            (Detector::IsolationForest, vec![true, true, false]),
            (Detector::LocalDensity, vec![true, false, false]),
            (Detector::RobustZScore, vec![true, false, false]),
            (Detector::ZScore, vec![false, true, false]),
        ];
        assert_eq!(combine(OutlierMethod::Ensemble, &votes, 0.5), vec![true, true, false]);
        assert_eq!(combine(OutlierMethod::Ensemble, &votes, 0.75), vec![true, false, false]);
        assert_eq!(combine(OutlierMethod::AllStrict, &votes, 0.5), vec![false, false, false]);
    }
}
