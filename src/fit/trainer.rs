//! Stage model training.
//!
//! `train_stage` turns a prepared frame into a fitted `StageModel`:
//!
//! 1. restrict to predictors + target and run the outlier filter
//! 2. drop rows with a non-positive predictor or target
//! 3. choose a CV policy from the remaining sample count
//! 4. grid-search hyperparameters on out-of-fold RMSE (when the family has a grid)
//! 5. compute metrics in original units from the out-of-fold predictions
//! 6. refit on every row for inference
//!
//! With two or fewer rows there is nothing to hold out: the model is fitted
//! once, its in-sample predictions stand in for the out-of-fold ones, and the
//! stage carries a warning.

use serde::{Deserialize, Serialize};

use crate::data::Frame;
use crate::domain::{OutlierConfig, TargetTransform};
use crate::error::AppError;
use crate::fit::augment::Augmentation;
use crate::fit::cv::{CvPolicy, out_of_fold};
use crate::fit::features::FeatureLayout;
use crate::fit::grid::search;
use crate::fit::model::{FittedPipeline, StageRow};
use crate::fit::regressor::{Hyperparams, RegressorSpec};
use crate::metrics::{Metrics, compute};
use crate::outlier::{OutlierSummary, filter_outliers};

/// Sample count at which leave-one-out gives way to repeated K-fold.
pub const DEFAULT_LOO_BELOW: usize = 10;

/// How one cost category is modeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub category: String,
    pub layout: FeatureLayout,
    pub transform: TargetTransform,
    pub regressor: RegressorSpec,
    pub loo_below: usize,
    pub augmentation: Option<Augmentation>,
}

impl StageSpec {
    /// Plain linear regression on raw predictors with an identity target.
    pub fn new(category: &str, predictors: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            layout: FeatureLayout::new(predictors),
            transform: TargetTransform::Identity,
            regressor: RegressorSpec::Linear,
            loo_below: DEFAULT_LOO_BELOW,
            augmentation: None,
        }
    }

    pub fn log_features(mut self, features: &[&str]) -> Self {
        self.layout = self.layout.with_log(features);
        self
    }

    pub fn with_scope(mut self) -> Self {
        self.layout = self.layout.with_scope();
        self
    }

    pub fn transform(mut self, transform: TargetTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn regressor(mut self, regressor: RegressorSpec) -> Self {
        self.regressor = regressor;
        self
    }

    pub fn loo_below(mut self, n: usize) -> Self {
        self.loo_below = n;
        self
    }

    pub fn augment(mut self, augmentation: Augmentation) -> Self {
        self.augmentation = Some(augmentation);
        self
    }

    pub fn predictors(&self) -> &[String] {
        &self.layout.predictors
    }
}

/// Run-wide training knobs.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub outlier: OutlierConfig,
    /// Seed for fold shuffles and synthetic samples.
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            outlier: OutlierConfig::default(),
            seed: 42,
        }
    }
}

/// A trained stage: fitted pipeline plus its evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageModel {
    pub category: String,
    pub predictors: Vec<String>,
    pub feature_names: Vec<String>,
    pub regressor: String,
    pub hyperparams: Hyperparams,
    pub cv: CvPolicy,
    /// False when metrics are in-sample (too few rows to hold any out).
    pub cross_validated: bool,
    pub metrics: Metrics,
    pub outliers: OutlierSummary,
    /// Rows used for fitting, after every filter.
    pub n_samples: usize,
    /// Rows dropped for a non-positive predictor or target.
    pub n_non_positive: usize,
    pub y_true: Vec<f64>,
    pub y_oof: Vec<f64>,
    pub warnings: Vec<String>,
    pipeline: FittedPipeline,
}

impl StageModel {
    /// Predict one cost in original units. `x` follows `predictors` order.
    pub fn predict(&self, x: &[f64], scope: &str) -> Result<f64, AppError> {
        if x.len() != self.predictors.len() {
            return Err(AppError::new(
                4,
                format!(
                    "{}: expected {} predictor values, got {}.",
                    self.category,
                    self.predictors.len(),
                    x.len()
                ),
            ));
        }
        let value = self.pipeline.predict(x, scope);
        if !value.is_finite() {
            return Err(AppError::new(4, format!("{}: prediction is not finite.", self.category)));
        }
        Ok(value)
    }
}

/// Train one stage on `frame`, which must contain the predictors and the target.
pub fn train_stage(frame: &Frame, spec: &StageSpec, opts: &TrainOptions) -> Result<StageModel, AppError> {
    let category = spec.category.as_str();
    let mut columns: Vec<&str> = spec.predictors().iter().map(String::as_str).collect();
    columns.push(category);
    let frame = frame.project(&columns)?;

    let filtered = filter_outliers(&frame, category, &opts.outlier)?;
    let (rows, n_non_positive) = positive_rows(&filtered.cleaned);
    if n_non_positive > 0 {
        log::debug!("  {category}: dropped {n_non_positive} rows with non-positive values");
    }
    if rows.is_empty() {
        return Err(AppError::new(
            3,
            format!("{category}: no samples with positive predictors and target remain."),
        ));
    }

    let n = rows.len();
    let y_true: Vec<f64> = rows.iter().map(|r| r.y).collect();
    let policy = CvPolicy::choose(n, spec.loo_below);
    let candidates = spec.regressor.grid();
    let Some(&first) = candidates.first() else {
        return Err(AppError::new(2, format!("{category}: regressor grid is empty.")));
    };

    let mut warnings = Vec::new();
    if filtered.summary.skipped {
        warnings.push(format!(
            "outlier detection skipped ({} samples)",
            filtered.summary.n_candidates
        ));
    }

    let fit_fold = |params: Hyperparams, fold_id: usize, train: &[usize], test: &[usize]| -> Result<Vec<f64>, AppError> {
        let train_rows: Vec<StageRow> = train.iter().map(|&i| rows[i].clone()).collect();
        let model = fit_rows(&train_rows, spec, params, fold_seed(opts.seed, fold_id))?;
        Ok(test.iter().map(|&i| model.predict(&rows[i].x, &rows[i].scope)).collect())
    };

    let (params, oof) = if !policy.is_cross_validated() {
        (first, None)
    } else if candidates.len() == 1 {
        let oof = out_of_fold(n, policy, opts.seed, |f, tr, te| fit_fold(first, f, tr, te))?;
        (first, Some(oof))
    } else {
        let best = search(&candidates, &y_true, |p| {
            out_of_fold(n, policy, opts.seed, |f, tr, te| fit_fold(*p, f, tr, te))
        })?;
        log::debug!(
            "  {category}: best {} of {} candidates (rmse {:.2})",
            best.best,
            best.evaluated,
            best.rmse
        );
        (best.best, Some(best.oof))
    };

    let pipeline = fit_rows(&rows, spec, params, opts.seed)?;
    let y_oof = match oof {
        Some(oof) => oof,
        None => {
            let msg = format!("only {n} samples: cross-validation skipped, metrics are in-sample");
            log::warn!("  {category}: {msg}");
            warnings.push(msg);
            rows.iter().map(|r| pipeline.predict(&r.x, &r.scope)).collect()
        }
    };
    if y_oof.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, format!("{category}: non-finite out-of-fold prediction.")));
    }

    let metrics = compute(&y_true, &y_oof, spec.transform.is_log())?;
    log::info!(
        "  {category}: n={n} {} {} R2={:.3} MAPE={:.1}%",
        spec.regressor.display_name(),
        policy.label(),
        metrics.r2,
        metrics.mape_pct
    );

    Ok(StageModel {
        category: category.to_string(),
        predictors: spec.predictors().to_vec(),
        feature_names: pipeline.feature_names(),
        regressor: spec.regressor.display_name().to_string(),
        hyperparams: params,
        cv: policy,
        cross_validated: policy.is_cross_validated(),
        metrics,
        outliers: filtered.summary,
        n_samples: n,
        n_non_positive,
        y_true,
        y_oof,
        warnings,
        pipeline,
    })
}

/// Fit on `rows`, adding synthetic rows first when the stage is augmented.
fn fit_rows(rows: &[StageRow], spec: &StageSpec, params: Hyperparams, seed: u64) -> Result<FittedPipeline, AppError> {
    match &spec.augmentation {
        Some(aug) => {
            let mut all = rows.to_vec();
            all.extend(aug.generate(rows, seed)?);
            FittedPipeline::fit(&all, &spec.layout, spec.transform, params)
        }
        None => FittedPipeline::fit(rows, &spec.layout, spec.transform, params),
    }
}

fn fold_seed(seed: u64, fold_id: usize) -> u64 {
    seed ^ ((fold_id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Rows with every value strictly positive; the target is the last column.
fn positive_rows(frame: &Frame) -> (Vec<StageRow>, usize) {
    let mut rows = Vec::with_capacity(frame.len());
    for r in &frame.rows {
        if r.values.iter().all(|v| *v > 0.0) {
            let (x, y) = r.values.split_at(r.values.len() - 1);
            rows.push(StageRow {
                key: r.key.clone(),
                scope: r.scope.clone(),
                x: x.to_vec(),
                y: y[0],
            });
        }
    }
    let dropped = frame.len() - rows.len();
    (rows, dropped)
}
