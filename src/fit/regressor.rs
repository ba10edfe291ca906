//! Regressors operating on standardized feature rows.
//!
//! Three families cover every stage:
//!
//! - ordinary least squares (with intercept)
//! - ridge regression over an alpha grid
//! - RBF kernel ridge regression over a (alpha, gamma) grid, the non-linear
//!   stage model for length-driven categories
//!
//! Inputs are already centered by the standard scaler, so ridge and kernel
//! ridge fit the intercept as the target mean and leave it unpenalized.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fit::grid::log_space;
use crate::math::{mean, solve_kernel_ridge, solve_least_squares, solve_ridge};

/// RBF kernel width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (n_features * var(X))`.
    Scale,
    /// `1 / n_features`.
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(self, x: &[Vec<f64>]) -> f64 {
        let p = x.first().map(|r| r.len()).unwrap_or(0).max(1) as f64;
        match self {
            Gamma::Value(g) => g,
            Gamma::Auto => 1.0 / p,
            Gamma::Scale => {
                let all: Vec<f64> = x.iter().flatten().copied().collect();
                let m = mean(&all);
                let var = all.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / all.len().max(1) as f64;
                if var.is_finite() && var > 1e-12 { 1.0 / (p * var) } else { 1.0 }
            }
        }
    }
}

/// Which regressor family a stage uses, with its search grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressorSpec {
    Linear,
    Ridge { alphas: Vec<f64> },
    KernelRidge { alphas: Vec<f64>, gammas: Vec<Gamma> },
}

impl RegressorSpec {
    /// Ridge over `alpha ∈ {0.01, 0.1, 1, 10, 100}`.
    pub fn ridge_default() -> Self {
        RegressorSpec::Ridge {
            alphas: log_space(0.01, 100.0, 5).unwrap_or_else(|_| vec![1.0]),
        }
    }

    /// Kernel ridge with regularization `1/C` for `C ∈ {5, 10, 80, 200, 1000}`.
    pub fn kernel_ridge_default() -> Self {
        RegressorSpec::KernelRidge {
            alphas: [5.0, 10.0, 80.0, 200.0, 1000.0].iter().map(|c| 1.0 / c).collect(),
            gammas: vec![Gamma::Scale, Gamma::Auto, Gamma::Value(0.01), Gamma::Value(0.1), Gamma::Value(1.0)],
        }
    }

    /// Every hyperparameter combination, in a fixed order.
    pub fn grid(&self) -> Vec<Hyperparams> {
        match self {
            RegressorSpec::Linear => vec![Hyperparams::Linear],
            RegressorSpec::Ridge { alphas } => alphas.iter().map(|&alpha| Hyperparams::Ridge { alpha }).collect(),
            RegressorSpec::KernelRidge { alphas, gammas } => alphas
                .iter()
                .flat_map(|&alpha| gammas.iter().map(move |&gamma| Hyperparams::KernelRidge { alpha, gamma }))
                .collect(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RegressorSpec::Linear => "linear",
            RegressorSpec::Ridge { .. } => "ridge",
            RegressorSpec::KernelRidge { .. } => "kernel-ridge(rbf)",
        }
    }
}

/// One concrete point of a regressor's grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hyperparams {
    Linear,
    Ridge { alpha: f64 },
    KernelRidge { alpha: f64, gamma: Gamma },
}

impl std::fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hyperparams::Linear => write!(f, "-"),
            Hyperparams::Ridge { alpha } => write!(f, "alpha={alpha}"),
            Hyperparams::KernelRidge { alpha, gamma } => match gamma {
                Gamma::Value(g) => write!(f, "alpha={alpha:.4} gamma={g}"),
                Gamma::Scale => write!(f, "alpha={alpha:.4} gamma=scale"),
                Gamma::Auto => write!(f, "alpha={alpha:.4} gamma=auto"),
            },
        }
    }
}

/// Fitted regressor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedRegressor {
    Linear {
        intercept: f64,
        coef: Vec<f64>,
    },
    KernelRidge {
        intercept: f64,
        gamma: f64,
        support: Vec<Vec<f64>>,
        dual: Vec<f64>,
    },
}

impl FittedRegressor {
    /// Fit on standardized rows `x` and (possibly transformed) targets `z`.
    pub fn fit(x: &[Vec<f64>], z: &[f64], params: Hyperparams) -> Result<Self, AppError> {
        let n = x.len();
        if n == 0 || n != z.len() {
            return Err(AppError::new(3, "Cannot fit a regressor without samples."));
        }
        let p = x[0].len();

        match params {
            Hyperparams::Linear => {
                let design = DMatrix::from_fn(n, p + 1, |i, j| if j == 0 { 1.0 } else { x[i][j - 1] });
                let y = DVector::from_column_slice(z);
                let beta = solve_least_squares(&design, &y)
                    .ok_or_else(|| AppError::new(4, "Least squares system could not be solved."))?;
                Ok(FittedRegressor::Linear {
                    intercept: beta[0],
                    coef: beta.iter().skip(1).copied().collect(),
                })
            }
            Hyperparams::Ridge { alpha } => {
                let intercept = mean(z);
                let design = DMatrix::from_fn(n, p, |i, j| x[i][j]);
                let y = DVector::from_iterator(n, z.iter().map(|v| v - intercept));
                let beta = if p == 0 {
                    DVector::zeros(0)
                } else {
                    solve_ridge(&design, &y, alpha)
                        .ok_or_else(|| AppError::new(4, format!("Ridge system (alpha={alpha}) could not be solved.")))?
                };
                Ok(FittedRegressor::Linear {
                    intercept,
                    coef: beta.iter().copied().collect(),
                })
            }
            Hyperparams::KernelRidge { alpha, gamma } => {
                let gamma = gamma.resolve(x);
                let intercept = mean(z);
                let kernel = DMatrix::from_fn(n, n, |i, j| rbf(&x[i], &x[j], gamma));
                let y = DVector::from_iterator(n, z.iter().map(|v| v - intercept));
                let dual = solve_kernel_ridge(&kernel, &y, alpha).ok_or_else(|| {
                    AppError::new(4, format!("Kernel ridge system (alpha={alpha}) could not be solved."))
                })?;
                Ok(FittedRegressor::KernelRidge {
                    intercept,
                    gamma,
                    support: x.to_vec(),
                    dual: dual.iter().copied().collect(),
                })
            }
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        match self {
            FittedRegressor::Linear { intercept, coef } => {
                intercept + coef.iter().zip(row).map(|(b, v)| b * v).sum::<f64>()
            }
            FittedRegressor::KernelRidge {
                intercept,
                gamma,
                support,
                dual,
            } => intercept + support.iter().zip(dual).map(|(s, a)| a * rbf(s, row, *gamma)).sum::<f64>(),
        }
    }
}

fn rbf(a: &[f64], b: &[f64], gamma: f64) -> f64 {
    let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * d2).exp()
}
