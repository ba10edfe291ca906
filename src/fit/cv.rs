//! Cross-validation policies and out-of-fold prediction.
//!
//! - `n <= 2`: no cross-validation (in-sample fit, flagged by the caller)
//! - `n < loo_below`: leave-one-out
//! - otherwise: repeated K-fold with `min(5, n/2)` folds and repeats
//!
//! With repeats, each sample's out-of-fold prediction is the mean over repeats.
//! Shuffles are seeded so folds are reproducible.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Largest fold and repeat count for repeated K-fold.
const MAX_FOLDS: usize = 5;

/// Below this many samples, cross-validation is not attempted.
pub const MIN_CV_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvPolicy {
    None,
    LeaveOneOut,
    RepeatedKFold { folds: usize, repeats: usize },
}

impl CvPolicy {
    /// Pick a policy for `n` samples.
    pub fn choose(n: usize, loo_below: usize) -> Self {
        if n < MIN_CV_SAMPLES {
            CvPolicy::None
        } else if n < loo_below {
            CvPolicy::LeaveOneOut
        } else {
            let k = MAX_FOLDS.min(n / 2).max(2);
            CvPolicy::RepeatedKFold { folds: k, repeats: k }
        }
    }

    pub fn is_cross_validated(&self) -> bool {
        !matches!(self, CvPolicy::None)
    }

    pub fn label(&self) -> String {
        match self {
            CvPolicy::None => "in-sample".to_string(),
            CvPolicy::LeaveOneOut => "LOO".to_string(),
            CvPolicy::RepeatedKFold { folds, repeats } => format!("{folds}-fold x{repeats}"),
        }
    }

    /// Test folds for `n` samples, one `Vec` of folds per repeat.
    pub fn splits(&self, n: usize, seed: u64) -> Vec<Vec<Vec<usize>>> {
        match *self {
            CvPolicy::None => Vec::new(),
            CvPolicy::LeaveOneOut => vec![(0..n).map(|i| vec![i]).collect()],
            CvPolicy::RepeatedKFold { folds, repeats } => (0..repeats)
                .map(|r| {
                    let mut order: Vec<usize> = (0..n).collect();
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(r as u64));
                    order.shuffle(&mut rng);
                    kfold(&order, folds)
                })
                .collect(),
        }
    }
}

/// Split `order` into `k` contiguous folds; the first `n % k` folds get one extra.
fn kfold(order: &[usize], k: usize) -> Vec<Vec<usize>> {
    let n = order.len();
    let base = n / k;
    let extra = n % k;
    let mut out = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = base + usize::from(f < extra);
        out.push(order[start..start + size].to_vec());
        start += size;
    }
    out
}

/// Out-of-fold predictions for `n` samples.
///
/// `fit_predict(fold_id, train, test)` must return one prediction per `test`
/// index. Folds run in parallel; accumulation is in fold order.
pub fn out_of_fold<F>(n: usize, policy: CvPolicy, seed: u64, fit_predict: F) -> Result<Vec<f64>, AppError>
where
    F: Fn(usize, &[usize], &[usize]) -> Result<Vec<f64>, AppError> + Sync,
{
    let tests: Vec<Vec<usize>> = policy.splits(n, seed).into_iter().flatten().collect();
    if tests.is_empty() {
        return Err(AppError::new(3, format!("No cross-validation folds for {n} samples.")));
    }

    let results: Vec<(usize, Vec<f64>)> = tests
        .par_iter()
        .enumerate()
        .map(|(fold_id, test)| {
            let train: Vec<usize> = (0..n).filter(|i| !test.contains(i)).collect();
            let preds = fit_predict(fold_id, &train, test)?;
            if preds.len() != test.len() {
                return Err(AppError::new(4, "Fold prediction count does not match the test fold."));
            }
            Ok((fold_id, preds))
        })
        .collect::<Result<_, AppError>>()?;

    let mut sums = vec![0.0; n];
    let mut counts = vec![0usize; n];
    for (fold_id, preds) in results {
        for (&i, p) in tests[fold_id].iter().zip(preds) {
            sums[i] += p;
            counts[i] += 1;
        }
    }

    sums.iter()
        .zip(&counts)
        .map(|(s, &c)| {
            if c == 0 {
                Err(AppError::new(4, "A sample never appeared in a test fold."))
            } else {
                Ok(s / c as f64)
            }
        })
        .collect()
}
