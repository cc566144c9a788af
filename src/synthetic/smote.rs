//! SMOTE oversampling

use crate::config::DEFAULT_RANDOM_STATE;
use crate::error::{KolosalError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

/// Distance with the row index as tie-break so neighbour sets are stable
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique).
///
/// Every class below the majority count is topped up with points placed on
/// the segment between a class member and one of its `k` nearest same-class
/// neighbours. Neighbours at distance zero are skipped and the gap is drawn
/// from `[eps, 1)`, so no synthetic row duplicates its seed point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    k_neighbors: usize,
    seed: u64,
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: DEFAULT_RANDOM_STATE,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest members of `rows` (by position in `rows`), nearest first
    fn find_neighbors(x: &Array2<f64>, point: usize, rows: &[usize], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        let origin = x.row(point);

        for (pos, &row) in rows.iter().enumerate() {
            let dist = Self::distance(origin, x.row(row));
            if dist <= 0.0 {
                continue; // self and exact duplicates
            }
            let candidate = DistIdx(dist, pos);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(&worst) = heap.peek() {
                if candidate < worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|DistIdx(_, pos)| pos)
            .collect()
    }

    fn generate_sample(
        point: ArrayView1<f64>,
        neighbor: ArrayView1<f64>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<f64> {
        let gap: f64 = rng.gen_range(f64::EPSILON..1.0);
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(KolosalError::ValidationError(
                "Need at least 2 classes for SMOTE".to_string(),
            ));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        self.target_counts = Some(counts.keys().map(|&class| (class, max_count)).collect());
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or(KolosalError::ModelNotFitted)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let indices = class_indices(y);
        let counts = class_counts(y);

        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let current_count = counts.get(&class).copied().unwrap_or(0);
            let n_to_generate = target_count.saturating_sub(current_count);
            n_synthetic.insert(class, n_to_generate);

            if n_to_generate == 0 {
                continue;
            }

            let rows = indices.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            let k = self.k_neighbors.min(rows.len().saturating_sub(1)).max(1);

            let neighbors: Vec<Vec<usize>> = rows
                .iter()
                .map(|&row| Self::find_neighbors(x, row, rows, k))
                .collect();
            let seeds: Vec<usize> = (0..rows.len())
                .filter(|&pos| !neighbors[pos].is_empty())
                .collect();

            if seeds.is_empty() {
                return Err(KolosalError::ComputationError(format!(
                    "class {} has no two distinct points to interpolate between",
                    class
                )));
            }

            debug!(class, k, generate = n_to_generate, "oversampling class");

            for _ in 0..n_to_generate {
                let pos = seeds[rng.gen_range(0..seeds.len())];
                let candidates = &neighbors[pos];
                let neighbor = candidates[rng.gen_range(0..candidates.len())];

                synthetic_x.push(Self::generate_sample(
                    x.row(rows[pos]),
                    x.row(rows[neighbor]),
                    &mut rng,
                ));
                synthetic_y.push(class);
            }
        }

        let n_original = x.nrows();
        let n_features = x.ncols();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}
