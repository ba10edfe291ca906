//! A fitted stage pipeline: feature encoding, scaling, regression and the
//! inverse target transform, applied as one unit.

use serde::{Deserialize, Serialize};

use crate::domain::TargetTransform;
use crate::error::AppError;
use crate::fit::features::{FeatureEncoder, FeatureLayout};
use crate::fit::regressor::{FittedRegressor, Hyperparams};
use crate::math::StandardScaler;

/// One training sample in predictor order.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRow {
    pub key: String,
    pub scope: String,
    pub x: Vec<f64>,
    pub y: f64,
}

impl StageRow {
    pub fn new(key: &str, scope: &str, x: Vec<f64>, y: f64) -> Self {
        Self {
            key: key.to_string(),
            scope: scope.to_string(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    encoder: FeatureEncoder,
    scaler: StandardScaler,
    regressor: FittedRegressor,
    transform: TargetTransform,
}

impl FittedPipeline {
    pub fn fit(
        rows: &[StageRow],
        layout: &FeatureLayout,
        transform: TargetTransform,
        params: Hyperparams,
    ) -> Result<Self, AppError> {
        if rows.is_empty() {
            return Err(AppError::new(3, "Cannot fit a stage without samples."));
        }
        let encoder = FeatureEncoder::fit(layout, rows.iter().map(|r| r.scope.as_str()));
        let raw: Vec<Vec<f64>> = rows.iter().map(|r| encoder.encode(&r.x, &r.scope)).collect();
        if raw.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AppError::new(4, "Non-finite feature value in training rows."));
        }
        let scaler = StandardScaler::fit(&raw);
        let x = scaler.transform(&raw);

        let z: Vec<f64> = rows.iter().map(|r| transform.forward(r.y)).collect();
        if z.iter().any(|v| !v.is_finite()) {
            return Err(AppError::new(4, "Target transform produced a non-finite value."));
        }

        let regressor = FittedRegressor::fit(&x, &z, params)?;
        Ok(Self {
            encoder,
            scaler,
            regressor,
            transform,
        })
    }

    /// Predict in original cost units.
    pub fn predict(&self, x: &[f64], scope: &str) -> f64 {
        let row = self.scaler.transform_row(&self.encoder.encode(x, scope));
        self.transform.inverse(self.regressor.predict(&row))
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.encoder.names()
    }
}
