//! Classifier trait shared by every estimator in the registry

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};

/// Binary classifier over standardized features.
///
/// Labels are 0.0 (retained) and 1.0 (departed).
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Short human-readable name used in logs and errors
    fn name(&self) -> &str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Positive-class (departure) probability per row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Whether `predict_proba` yields calibrated class probabilities
    fn supports_probability(&self) -> bool {
        true
    }

    /// Hard labels: 1.0 when the positive probability exceeds one half
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Shape and label checks run at the top of every `fit`
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(KolosalError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(KolosalError::ValidationError(
            "cannot fit on an empty training set".to_string(),
        ));
    }
    if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(KolosalError::ValidationError(format!(
            "labels must be 0 or 1, found {}",
            bad
        )));
    }
    Ok(())
}

/// Feature-count check for prediction
pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(KolosalError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
