//! Feature standardization

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature centre and scale learned from training data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

/// Standard scaler: (x - mean) / std, with the population standard deviation.
///
/// Constant features get a scale of 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Learn column means and standard deviations
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(KolosalError::DataError(
                "cannot fit a scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| KolosalError::ComputationError("column means".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON && s.is_finite() { s } else { 1.0 });

        self.params = Some(ScalerParams { mean, scale });
        Ok(self)
    }

    /// Apply the learned standardization
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(KolosalError::ModelNotFitted)?;

        if x.ncols() != params.mean.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", params.mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok((x - &params.mean) / &params.scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.mean)
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for col in scaled.columns() {
            let mean = col.mean().unwrap();
            let std = col.std(0.0);
            assert!(mean.abs() < 1e-12);
            assert!((std - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        assert!(scaled.column(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_uses_training_statistics() {
        let train = array![[0.0], [2.0]];
        let test = array![[4.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();
        let scaled = scaler.transform(&test).unwrap();
        assert!((scaled[[0, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(KolosalError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_feature_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
