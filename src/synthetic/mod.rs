//! Class-imbalance correction
//!
//! Synthetic minority oversampling applied to the training partition only.

mod smote;

pub use smote::SMOTE;

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Original rows first, then synthetic rows
    pub x: Array2<f64>,
    /// Labels aligned with `x`
    pub y: Array1<i64>,
    /// Synthetic rows generated per class
    pub n_synthetic: BTreeMap<i64, usize>,
}

impl ResampleResult {
    pub fn total_synthetic(&self) -> usize {
        self.n_synthetic.values().sum()
    }

    /// Labels as floats, the representation the estimators train on
    pub fn y_f64(&self) -> Array1<f64> {
        self.y.mapv(|v| v as f64)
    }
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Learn per-class targets
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Class labels from a float target
pub fn class_labels(y: &Array1<f64>) -> Array1<i64> {
    y.mapv(|v| v.round() as i64)
}

/// Count per class, ordered by label
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Row indices per class, ordered by label
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}
