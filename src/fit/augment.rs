//! Synthetic sample generation for sparse stages.
//!
//! New samples are interpolated between random pairs of real samples with a
//! `Beta(2, 2)` mixing weight and a small multiplicative jitter. The target is
//! scaled from the first sample of the pair by `prod(ratio_j ^ elasticity_j)`
//! where `ratio_j` is the interpolated-to-original predictor ratio.
//!
//! Augmentation is applied to training rows only (inside each fold and for the
//! final fit); synthetic rows never reach metrics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fit::model::StageRow;

/// Multiplicative jitter half-width (`U(1 - j, 1 + j)`).
const DEFAULT_JITTER: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Augmentation {
    pub n_synthetic: usize,
    /// One exponent per predictor.
    pub elasticities: Vec<f64>,
    pub jitter: f64,
}

impl Augmentation {
    pub fn new(n_synthetic: usize, elasticities: &[f64]) -> Self {
        Self {
            n_synthetic,
            elasticities: elasticities.to_vec(),
            jitter: DEFAULT_JITTER,
        }
    }

    /// Generate synthetic rows from `rows`. Fewer than two rows yields none.
    pub fn generate(&self, rows: &[StageRow], seed: u64) -> Result<Vec<StageRow>, AppError> {
        if rows.len() < 2 || self.n_synthetic == 0 {
            return Ok(Vec::new());
        }
        let beta = Beta::new(2.0, 2.0).map_err(|e| AppError::new(2, format!("Invalid mixing distribution: {e}")))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let (lo, hi) = (1.0 - self.jitter, 1.0 + self.jitter);

        let mut out = Vec::with_capacity(self.n_synthetic);
        for k in 0..self.n_synthetic {
            let a = rng.gen_range(0..rows.len());
            let mut b = rng.gen_range(0..rows.len() - 1);
            if b >= a {
                b += 1;
            }
            let (first, second) = (&rows[a], &rows[b]);
            let w: f64 = beta.sample(&mut rng);

            let x: Vec<f64> = first
                .x
                .iter()
                .zip(&second.x)
                .map(|(p, q)| (w * p + (1.0 - w) * q) * rng.gen_range(lo..hi))
                .collect();

            let scale: f64 = x
                .iter()
                .zip(&first.x)
                .zip(&self.elasticities)
                .map(|((new, old), e)| if *old != 0.0 { (new / old).powf(*e) } else { 1.0 })
                .product();

            out.push(StageRow {
                key: format!("synthetic-{k}"),
                scope: first.scope.clone(),
                x,
                y: first.y * scale * rng.gen_range(lo..hi),
            });
        }
        Ok(out)
    }
}
