//! Gradient boosted trees for binary classification
//!
//! Each round fits a regression tree to the log-loss residuals and replaces
//! its leaf values with a single Newton step, scaled by the learning rate.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{check_features, check_fit_input, Classifier};
use crate::error::{KolosalError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row fraction drawn (without replacement) for each tree
    pub subsample: f64,
    /// Seed for row subsampling
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 0,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Gradient Boosting Classifier (log-loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if c.n_estimators == 0 {
            return Err(KolosalError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(c.learning_rate > 0.0 && c.learning_rate.is_finite()) {
            return Err(KolosalError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: c.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(KolosalError::InvalidParameter {
                name: "subsample".to_string(),
                value: c.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        Ok(())
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let n_sub = ((n as f64) * self.config.subsample).round().max(1.0) as usize;
        let mut indices = rand::seq::index::sample(rng, n, n_sub).into_vec();
        indices.sort_unstable();
        indices
    }

    /// Raw log-odds scores
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let mut raw = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            raw = raw + tree.predict(x)? * self.config.learning_rate;
        }
        Ok(raw)
    }
}

impl Classifier for GradientBoostingClassifier {
    fn name(&self) -> &str {
        "GradientBoosting"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate_config()?;

        let n_samples = x.nrows();
        self.n_features = x.ncols();

        // prior log-odds, clipped so single-class folds stay finite
        let p = y.mean().unwrap_or(0.5).clamp(1e-15, 1.0 - 1e-15);
        self.initial_prediction = (p / (1.0 - p)).ln();

        let mut raw = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut importances = Array1::<f64>::zeros(self.n_features);
        self.trees.clear();

        for round in 0..self.config.n_estimators {
            let proba = raw.mapv(sigmoid);
            let residuals = y - &proba;
            let indices = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTree::new(Criterion::Mse)
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_seed(self.config.random_state.wrapping_add(round as u64));
            tree.fit_indices(x, &residuals, &indices)?;

            // Newton step per leaf: sum(residual) / sum(p * (1 - p))
            let leaves = tree.apply(x)?;
            let mut numerator = vec![0.0; tree.n_leaves()];
            let mut denominator = vec![0.0; tree.n_leaves()];
            for &i in &indices {
                numerator[leaves[i]] += residuals[i];
                denominator[leaves[i]] += proba[i] * (1.0 - proba[i]);
            }
            let values: Vec<f64> = numerator
                .iter()
                .zip(denominator.iter())
                .map(|(num, den)| if den.abs() < 1e-150 { 0.0 } else { num / den })
                .collect();
            tree.set_leaf_values(&values)?;

            for (i, leaf) in leaves.iter().enumerate() {
                raw[i] += self.config.learning_rate * values[*leaf];
            }
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
            self.trees.push(tree);
        }

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        self.feature_importances = Some(importances);

        debug!(
            rounds = self.trees.len(),
            learning_rate = self.config.learning_rate,
            "gradient boosting fitted"
        );
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let n = 60;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64 / n as f64;
            if j == 0 {
                t * 4.0 - 2.0
            } else {
                ((i * 13) % 7) as f64 / 7.0
            }
        });
        let y = Array1::from_shape_fn(n, |i| if i as f64 / n as f64 > 0.5 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| p == t)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy > 0.95, "accuracy {}", accuracy);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_subsampling_is_seeded() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            subsample: 0.7,
            random_state: 5,
            ..Default::default()
        };
        let mut a = GradientBoostingClassifier::new(config.clone());
        let mut b = GradientBoostingClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let importances = model.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_rejects_bad_learning_rate() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            learning_rate: 0.0,
            ..Default::default()
        });
        assert!(model.fit(&x, &y).is_err());
    }
}
