//! Standardize-then-classify pipeline

use crate::error::{KolosalError, Result};
use crate::preprocessing::StandardScaler;
use crate::training::{Classifier, ModelConfig};
use ndarray::{Array1, Array2};

/// Unfitted scaler + estimator composition.
///
/// Construction rejects estimators without probability output, so a
/// pipeline that would fail at ROC-AUC or segmentation time is never trained.
#[derive(Debug)]
pub struct Pipeline {
    scaler: StandardScaler,
    estimator: Box<dyn Classifier>,
    config: Option<ModelConfig>,
}

impl Pipeline {
    pub fn new(estimator: Box<dyn Classifier>) -> Result<Self> {
        if !estimator.supports_probability() {
            return Err(KolosalError::CapabilityError {
                estimator: estimator.name().to_string(),
                capability: "probability prediction".to_string(),
            });
        }
        Ok(Self {
            scaler: StandardScaler::new(),
            estimator,
            config: None,
        })
    }

    /// Pipeline around a fresh estimator for a registry configuration
    pub fn from_config(config: ModelConfig, seed: u64) -> Result<Self> {
        Ok(Self::new(config.build(seed))?.with_config(config))
    }

    /// Record the registry configuration the estimator came from
    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn estimator_name(&self) -> &str {
        self.estimator.name()
    }

    /// Fit the scaler on `x`, then the estimator on the scaled rows
    pub fn fit(mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedPipeline> {
        let scaled = self.scaler.fit_transform(x)?;
        self.estimator.fit(&scaled, y)?;
        Ok(FittedPipeline {
            scaler: self.scaler,
            estimator: self.estimator,
            config: self.config,
        })
    }
}

/// Pipeline whose scaler and estimator were both fit on the same training rows
#[derive(Debug)]
pub struct FittedPipeline {
    scaler: StandardScaler,
    estimator: Box<dyn Classifier>,
    config: Option<ModelConfig>,
}

impl FittedPipeline {
    /// Departure probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(x)?;
        self.estimator.predict_proba(&scaled)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(x)?;
        self.estimator.predict(&scaled)
    }

    pub fn estimator_name(&self) -> &str {
        self.estimator.name()
    }

    /// Registry configuration the estimator was built from, if any
    pub fn config(&self) -> Option<&ModelConfig> {
        self.config.as_ref()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.estimator.feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[derive(Debug)]
    struct ScoreOnly;

    impl Classifier for ScoreOnly {
        fn name(&self) -> &str {
            "score-only"
        }
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
            panic!("must not be fit");
        }
        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::zeros(x.nrows()))
        }
        fn supports_probability(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_capability_checked_at_construction() {
        let err = Pipeline::new(Box::new(ScoreOnly)).unwrap_err();
        assert!(matches!(
            err,
            KolosalError::CapabilityError { ref estimator, .. } if estimator == "score-only"
        ));
    }

    #[test]
    fn test_scaler_fit_on_training_rows() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let config = ModelConfig::Logistic {
            c: 1.0,
            max_iter: 100,
        };
        let fitted = Pipeline::from_config(config, 0).unwrap().fit(&x, &y).unwrap();

        assert_eq!(fitted.config(), Some(&config));
        assert_eq!(fitted.scaler().mean().unwrap(), &array![2.5, 25.0]);

        let proba = fitted.predict_proba(&array![[0.0, 0.0], [5.0, 50.0]]).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[1] > 0.5);
    }
}
