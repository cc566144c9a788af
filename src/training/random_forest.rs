//! Random Forest classifier

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{check_features, check_fit_input, Classifier};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Bagged ensemble of Gini trees; the probability is the mean leaf
/// positive fraction over all trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree instead of using every row
    pub bootstrap: bool,
    /// Tree `i` is seeded with `random_state + i`
    pub random_state: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: 0,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
            }
        }
        if !self.trees.is_empty() {
            total /= self.trees.len() as f64;
        }
        self.feature_importances = Some(total);
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "RandomForest"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(KolosalError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let max_features = self.max_features.resolve(self.n_features);
        let base_seed = self.random_state;

        // collected in tree order regardless of scheduling
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new(Criterion::Gini)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_seed(rng.gen());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit_indices(x, y, &sample_indices)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            proba += p;
        }
        Ok(proba / self.trees.len() as f64)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let base = if i < n / 2 { 0.0 } else { 3.0 };
            base + ((i * 7 + j * 3) % 10) as f64 / 10.0
        });
        let y = Array1::from_shape_fn(n, |i| if i < n / 2 { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_forest_learns_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(10).with_random_state(123);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 10);
        let predictions = forest.predict(&x).unwrap();
        assert_eq!(predictions, y);

        let proba = forest.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(5).with_random_state(9);
        let mut b = RandomForest::new(5).with_random_state(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_without_bootstrap() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(3)
            .with_bootstrap(false)
            .with_random_state(1);
        forest.fit(&x, &y).unwrap();
        let importances = forest.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjacent_float_feature_values() {
        let low = f64::from_bits(1.0f64.to_bits() + 1);
        let high = f64::from_bits(1.0f64.to_bits() + 2);
        let x = Array2::from_shape_vec((2, 1), vec![low, high]).unwrap();
        let y = Array1::from(vec![0.0, 1.0]);

        let mut forest = RandomForest::new(1).with_bootstrap(false);
        forest.fit(&x, &y).unwrap();

        let proba = forest.predict_proba(&x).unwrap();
        assert_eq!(proba, y);
        let beyond = forest.predict_proba(&Array2::from_elem((1, 1), 2.0)).unwrap();
        assert!(beyond.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(18), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(50).resolve(18), 18);
    }
}
