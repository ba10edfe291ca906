//! Linear solvers used by the stage regressors.
//!
//! Every regression problem here is tiny (a handful of features, at most a few
//! hundred rows), so we favour robust dense factorizations over speed:
//!
//! - ordinary least squares goes through SVD, which also copes with the
//!   underdetermined systems leave-one-out produces on 2–3 samples
//! - ridge and kernel ridge solve a symmetric positive definite system via
//!   Cholesky, falling back to LU when round-off breaks definiteness

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    // Near-collinear design columns are common (length and its log1p), so we
    // accept progressively looser singular value cutoffs.
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `(XᵀX + αI) β = Xᵀy` for centered inputs.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Option<DVector<f64>> {
    let xt = x.transpose();
    let mut gram = &xt * x;
    for i in 0..gram.nrows() {
        gram[(i, i)] += alpha;
    }
    let rhs = &xt * y;
    solve_spd(gram, rhs)
}

/// Solve `(K + αI) a = y` for a kernel matrix `K`.
pub fn solve_kernel_ridge(kernel: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Option<DVector<f64>> {
    let mut system = kernel.clone();
    for i in 0..system.nrows() {
        system[(i, i)] += alpha;
    }
    solve_spd(system, y.clone())
}

fn solve_spd(system: DMatrix<f64>, rhs: DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = system.clone().cholesky() {
        let sol = chol.solve(&rhs);
        if sol.iter().all(|v| v.is_finite()) {
            return Some(sol);
        }
    }
    let sol = system.lu().solve(&rhs)?;
    if sol.iter().all(|v| v.is_finite()) {
        Some(sol)
    } else {
        None
    }
}
