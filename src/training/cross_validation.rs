//! Cross-validation splitters

use crate::error::{KolosalError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl CVStrategy {
    /// Unshuffled stratified folds, the grid-search default
    pub fn stratified(n_splits: usize) -> Self {
        CVStrategy::StratifiedKFold {
            n_splits,
            shuffle: false,
        }
    }

    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => {
                *n_splits
            }
        }
    }
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::stratified(5)
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Fail unless every class has at least `n_splits` members.
///
/// Runs before any estimator is built so an impossible request never
/// wastes a fit.
pub fn check_stratifiable(y: &Array1<f64>, n_splits: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(KolosalError::InvalidParameter {
            name: "n_splits".to_string(),
            value: n_splits.to_string(),
            reason: "must be at least 2".to_string(),
        });
    }

    let counts = class_counts(y);
    if let Some((&class_label, &class_count)) = counts
        .iter()
        .filter(|(_, &count)| count < n_splits)
        .min_by_key(|(_, &count)| count)
    {
        return Err(KolosalError::FoldCountError {
            n_splits,
            class_label,
            class_count,
        });
    }
    Ok(())
}

fn class_counts(y: &Array1<f64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &v in y.iter() {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    counts
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 0,
        }
    }

    /// Seed used when the strategy shuffles
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate train/test splits for the rows of `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        match self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => self.k_fold_split(y.len(), n_splits, shuffle),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                self.stratified_k_fold_split(y, n_splits, shuffle)
            }
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(KolosalError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(KolosalError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut test_folds = vec![0usize; n_samples];
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            for &idx in &indices[current..current + fold_size] {
                test_folds[idx] = fold_idx;
            }
            current += fold_size;
        }

        Ok(Self::splits_from_assignment(&test_folds, n_splits))
    }

    /// Each class's rows, in order, are cut into contiguous runs whose
    /// per-fold sizes come from dealing the sorted labels round-robin.
    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        check_stratifiable(y, n_splits)?;

        let labels: Vec<i64> = y.iter().map(|v| v.round() as i64).collect();
        let classes: Vec<i64> = class_counts(y).into_keys().collect();

        let mut sorted = labels.clone();
        sorted.sort_unstable();

        // allocation[fold][class]
        let mut allocation = vec![vec![0usize; classes.len()]; n_splits];
        for (pos, label) in sorted.iter().enumerate() {
            if let Ok(k) = classes.binary_search(label) {
                allocation[pos % n_splits][k] += 1;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut test_folds = vec![0usize; labels.len()];

        for (k, class) in classes.iter().enumerate() {
            let mut fold_sequence: Vec<usize> = (0..n_splits)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][k]))
                .collect();
            if shuffle {
                fold_sequence.shuffle(&mut rng);
            }

            let members = labels
                .iter()
                .enumerate()
                .filter(|(_, label)| *label == class)
                .map(|(i, _)| i);
            for (idx, fold) in members.zip(fold_sequence) {
                test_folds[idx] = fold;
            }
        }

        Ok(Self::splits_from_assignment(&test_folds, n_splits))
    }

    fn splits_from_assignment(test_folds: &[usize], n_splits: usize) -> Vec<CVSplit> {
        (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..test_folds.len()).partition(|&i| test_folds[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}
