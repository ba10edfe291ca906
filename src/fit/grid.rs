//! Hyperparameter grid search.
//!
//! Each candidate is scored by out-of-fold RMSE in original cost units.
//! Candidates are evaluated in parallel; the result is deterministic because
//! ties are broken by grid index, never by completion order.

use rayon::prelude::*;

use crate::error::AppError;
use crate::fit::regressor::Hyperparams;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid grid range: min={min}, max={max} (must be finite, >0, and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Winner of a grid search.
#[derive(Debug, Clone)]
pub struct GridOutcome {
    pub best: Hyperparams,
    pub best_index: usize,
    pub rmse: f64,
    /// Out-of-fold predictions of the winning candidate.
    pub oof: Vec<f64>,
    /// Number of candidates that produced a usable score.
    pub evaluated: usize,
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    rmse: f64,
    oof: Vec<f64>,
}

/// Score every candidate with `evaluate` (which returns out-of-fold
/// predictions aligned with `y`) and keep the lowest RMSE.
///
/// Candidates that fail or produce non-finite predictions are skipped.
pub fn search<F>(candidates: &[Hyperparams], y: &[f64], evaluate: F) -> Result<GridOutcome, AppError>
where
    F: Fn(&Hyperparams) -> Result<Vec<f64>, AppError> + Sync,
{
    let scored: Vec<Candidate> = candidates
        .par_iter()
        .enumerate()
        .filter_map(|(idx, params)| match evaluate(params) {
            Ok(oof) => {
                let rmse = rmse(y, &oof)?;
                Some(Candidate { idx, rmse, oof })
            }
            Err(err) => {
                log::debug!("    candidate {params} skipped: {}", err.message());
                None
            }
        })
        .collect();

    if scored.is_empty() {
        return Err(AppError::new(4, "No hyperparameter candidate produced a valid score."));
    }

    let mut best = &scored[0];
    for c in &scored[1..] {
        if c.rmse < best.rmse || (c.rmse == best.rmse && c.idx < best.idx) {
            best = c;
        }
    }

    Ok(GridOutcome {
        best: candidates[best.idx],
        best_index: best.idx,
        rmse: best.rmse,
        oof: best.oof.clone(),
        evaluated: scored.len(),
    })
}

fn rmse(y: &[f64], pred: &[f64]) -> Option<f64> {
    if y.len() != pred.len() || y.is_empty() || pred.iter().any(|p| !p.is_finite()) {
        return None;
    }
    let sse: f64 = y.iter().zip(pred).map(|(a, b)| (a - b) * (a - b)).sum();
    Some((sse / y.len() as f64).sqrt())
}
