//! L2-regularized logistic regression

use super::models::{check_features, check_fit_input, Classifier};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Solve A x = b for symmetric positive definite A via Cholesky decomposition.
/// Retries once with a small diagonal ridge when A is not numerically PD.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_solve_inner(a, b).or_else(|| {
        let mut a_reg = a.clone();
        let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
        for k in 0..n {
            a_reg[[k, k]] += ridge.max(1e-12);
        }
        cholesky_solve_inner(&a_reg, b)
    })
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logistic regression minimizing `sum(log_loss) + ||w||^2 / (2C)`.
///
/// Fitted with Newton-Raphson (iteratively reweighted least squares); the
/// intercept is not penalized. `c` is the inverse regularization strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Newton iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        check_features(coef.len(), x)?;
        Ok(x.dot(coef) + self.intercept)
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "LogisticRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(KolosalError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let (n_samples, n_features) = x.dim();
        let n_params = n_features + 1;

        // design matrix with a trailing intercept column
        let mut design = Array2::ones((n_samples, n_params));
        design.slice_mut(ndarray::s![.., ..n_features]).assign(x);

        let penalty = 1.0 / self.c;
        let mut theta = Array1::<f64>::zeros(n_params);
        self.n_iter = 0;

        for iter in 0..self.max_iter {
            let z = design.dot(&theta);
            let p = z.mapv(sigmoid);
            let w = p.mapv(|pi| (pi * (1.0 - pi)).max(1e-12));

            let mut gradient = design.t().dot(&(&p - y));
            let weighted = &design * &w.view().insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted);
            for j in 0..n_features {
                gradient[j] += penalty * theta[j];
                hessian[[j, j]] += penalty;
            }

            let step = cholesky_solve(&hessian, &gradient).ok_or_else(|| {
                KolosalError::ComputationError("singular Hessian in logistic regression".to_string())
            })?;
            theta -= &step;
            self.n_iter = iter + 1;

            let step_norm = step.iter().map(|s| s.abs()).fold(0.0, f64::max);
            if step_norm < self.tol {
                break;
            }
        }

        if theta.iter().any(|v| !v.is_finite()) {
            return Err(KolosalError::ComputationError(
                "logistic regression diverged".to_string(),
            ));
        }

        debug!(c = self.c, iterations = self.n_iter, "logistic regression converged");
        self.intercept = theta[n_features];
        self.coefficients = Some(theta.slice(ndarray::s![..n_features]).to_owned());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}
