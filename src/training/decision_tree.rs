//! CART decision tree used by the forest and boosting ensembles

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
        leaf_id: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity over 0/1 labels; leaves hold the positive fraction
    Gini,
    /// Mean squared error; leaves hold the mean target
    Mse,
}

impl Criterion {
    /// Impurity from running sums, so split scans stay linear
    fn impurity(self, count: f64, sum: f64, sq_sum: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        let mean = sum / count;
        match self {
            Criterion::Gini => 2.0 * mean * (1.0 - mean),
            Criterion::Mse => (sq_sum / count - mean * mean).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled at each node; all features when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub seed: u64,
    n_features: usize,
    n_leaves: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(Criterion::Gini)
    }
}

impl DecisionTree {
    pub fn new(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            seed: 0,
            n_features: 0,
            n_leaves: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on every row of `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    /// Fit on the given rows; repeated indices act as sample weights
    pub fn fit_indices(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Result<&mut Self> {
        let n_features = x.ncols();

        if x.nrows() != y.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(KolosalError::ValidationError(
                "cannot grow a tree from zero samples".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut importances = vec![0.0; n_features];
        let mut n_leaves = 0usize;

        let root = self.build_tree(
            x,
            y,
            indices.to_vec(),
            0,
            &mut rng,
            &mut importances,
            &mut n_leaves,
        );

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.n_leaves = n_leaves;
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
        n_leaves: &mut usize,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let count = n_samples as f64;
        let impurity = self.criterion.impurity(count, sum, sq_sum);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        let split = if should_stop {
            None
        } else {
            let features = self.candidate_features(rng);
            self.find_best_split(x, y, &indices, &features, impurity)
        };

        let partition = split.map(|split| {
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| x[[i, split.feature_idx]] <= split.threshold);
            (split, left, right)
        });

        // a split leaving either side empty would recurse on the same rows
        let Some((split, left_indices, right_indices)) =
            partition.filter(|(_, left, right)| !left.is_empty() && !right.is_empty())
        else {
            let leaf_id = *n_leaves;
            *n_leaves += 1;
            return TreeNode::Leaf {
                value: sum / count,
                n_samples,
                leaf_id,
            };
        };

        importances[split.feature_idx] += count * split.gain;

        let left = self.build_tree(x, y, left_indices, depth + 1, rng, importances, n_leaves);
        let right = self.build_tree(x, y, right_indices, depth + 1, rng, importances, n_leaves);

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut features = rand::seq::index::sample(rng, self.n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best split across candidate features; ties keep the earlier feature
    /// and the lower threshold.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| self.scan_feature(x, y, indices, feature_idx, parent_impurity))
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(b) if b.gain >= candidate.gain => Some(b),
                _ => Some(candidate),
            })
    }

    fn scan_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let mut values: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (x[[i, feature_idx]], y[i]))
            .collect();
        values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let n = values.len();
        let total_sum: f64 = values.iter().map(|(_, yi)| yi).sum();
        let total_sq: f64 = values.iter().map(|(_, yi)| yi * yi).sum();

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for k in 0..n - 1 {
            let (value, yi) = values[k];
            left_sum += yi;
            left_sq += yi * yi;

            let next = values[k + 1].0;
            if next <= value {
                continue;
            }

            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                continue;
            }

            let left_imp = self.criterion.impurity(left_n as f64, left_sum, left_sq);
            let right_imp =
                self.criterion
                    .impurity(right_n as f64, total_sum - left_sum, total_sq - left_sq);
            let weighted = (left_n as f64 * left_imp + right_n as f64 * right_imp) / n as f64;
            let gain = parent_impurity - weighted;

            if best.map_or(true, |b| gain > b.gain) {
                // the midpoint of adjacent floats can round up to `next`
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                });
            }
        }

        best
    }

    fn leaf_for<'a>(node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a TreeNode {
        match node {
            TreeNode::Leaf { .. } => node,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::leaf_for(left, sample)
                } else {
                    Self::leaf_for(right, sample)
                }
            }
        }
    }

    fn checked_root(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Leaf value per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.checked_root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match Self::leaf_for(root, row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect())
    }

    /// Leaf id per row
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.checked_root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match Self::leaf_for(root, row) {
                TreeNode::Leaf { leaf_id, .. } => *leaf_id,
                TreeNode::Split { .. } => 0,
            })
            .collect())
    }

    /// Overwrite leaf values, indexed by leaf id
    pub fn set_leaf_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.n_leaves {
            return Err(KolosalError::ShapeError {
                expected: format!("{} leaf values", self.n_leaves),
                actual: format!("{} leaf values", values.len()),
            });
        }
        fn visit(node: &mut TreeNode, values: &[f64]) {
            match node {
                TreeNode::Leaf { value, leaf_id, .. } => *value = values[*leaf_id],
                TreeNode::Split { left, right, .. } => {
                    visit(left, values);
                    visit(right, values);
                }
            }
        }
        let root = self.root.as_mut().ok_or(KolosalError::ModelNotFitted)?;
        visit(root, values);
        Ok(())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new(Criterion::Gini);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
    }

    #[test]
    fn test_leaf_holds_positive_fraction() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];

        let mut tree = DecisionTree::new(Criterion::Gini);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict(&array![[0.0]]).unwrap();
        assert!((proba[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_regressor_fits_steps() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new(Criterion::Mse);
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new(Criterion::Gini).with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 1);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new(Criterion::Gini);
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_apply_and_set_leaf_values() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new(Criterion::Mse);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), 2);

        let leaves = tree.apply(&x).unwrap();
        assert_eq!(leaves[0], leaves[1]);
        assert_ne!(leaves[1], leaves[2]);

        tree.set_leaf_values(&[-5.0, 5.0]).unwrap();
        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions[0], -5.0);
        assert_eq!(predictions[3], 5.0);
    }

    #[test]
    fn test_adjacent_float_values_split_cleanly() {
        let low = f64::from_bits(1.0f64.to_bits() + 1);
        let high = f64::from_bits(1.0f64.to_bits() + 2);
        let x = Array2::from_shape_vec((2, 1), vec![low, high]).unwrap();
        let y = array![0.0, 1.0];

        for criterion in [Criterion::Gini, Criterion::Mse] {
            let mut tree = DecisionTree::new(criterion).with_max_depth(6);
            tree.fit(&x, &y).unwrap();

            assert_eq!(tree.get_depth(), 1);
            assert_eq!(tree.n_leaves(), 2);
            assert_eq!(tree.predict(&x).unwrap(), y);
            let beyond = tree.predict(&array![[2.0], [0.0]]).unwrap();
            assert_eq!(beyond, array![1.0, 0.0]);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::default();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }
}
