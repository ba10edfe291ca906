//! Univariate z-score detectors on the target column.

use crate::math::{mad, median, standardize};

/// Consistency constant relating MAD to the normal standard deviation.
const MAD_CONSISTENCY: f64 = 0.6745;

/// Conventional cut-off for the modified z-score.
pub const ROBUST_Z_CUTOFF: f64 = 3.5;

/// Cut-off for the plain standardized score.
pub const Z_CUTOFF: f64 = 3.0;

/// Modified z-score `0.6745 (x - median) / MAD`, flagged above `3.5`.
///
/// A zero MAD (half or more of the values identical) flags nothing.
pub fn robust_flags(values: &[f64]) -> Vec<bool> {
    let (Some(med), Some(mad)) = (median(values), mad(values)) else {
        return vec![false; values.len()];
    };
    if mad == 0.0 {
        return vec![false; values.len()];
    }
    values
        .iter()
        .map(|&v| (MAD_CONSISTENCY * (v - med) / mad).abs() > ROBUST_Z_CUTOFF)
        .collect()
}

/// Target standardized on its own statistics, flagged above `3`.
pub fn zscore_flags(values: &[f64]) -> Vec<bool> {
    standardize(values).iter().map(|z| z.abs() > Z_CUTOFF).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robust_flags_extreme_value() {
        let mut v: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        v.push(10_000.0);
        let flags = robust_flags(&v);
        assert!(flags[20]);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn robust_flags_nothing_when_mad_is_zero() {
        let v = [5.0, 5.0, 5.0, 5.0, 900.0];
        assert!(robust_flags(&v).iter().all(|f| !f));
    }

    #[test]
    fn zscore_flags_far_point() {
        let mut v = vec![1.0; 30];
        v.push(100.0);
        let flags = zscore_flags(&v);
        assert!(flags[30]);
        assert!(flags[..30].iter().all(|f| !f));
    }
}
