//! K-Means over employee features: elbow curve and cluster profiles

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// K-Means clustering with k-means++ initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: u64,
    /// Fitted cluster centroids (n_clusters x n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster assigned to each training row
    labels: Option<Vec<usize>>,
    /// Sum of squared distances to nearest centroid
    inertia: Option<f64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

fn euclidean_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids
        .rows()
        .into_iter()
        .enumerate()
        .map(|(c, centroid)| (c, euclidean_sq(row, centroid)))
        .fold((0, f64::MAX), |best, cur| if cur.1 < best.1 { cur } else { best })
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: 0,
            centroids: None,
            labels: None,
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    pub fn inertia(&self) -> Option<f64> {
        self.inertia
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            let chosen_so_far = centroids.slice(ndarray::s![..c, ..]).to_owned();
            let dists: Vec<f64> = x
                .rows()
                .into_iter()
                .map(|row| nearest(row, &chosen_so_far).1)
                .collect();

            // weighted by squared distance to the nearest chosen centroid
            let total: f64 = dists.iter().sum();
            let chosen = if total <= 0.0 {
                rng.gen_range(0..n_samples)
            } else {
                let r = rng.gen_range(0.0..total);
                let mut cumulative = 0.0;
                dists
                    .iter()
                    .position(|d| {
                        cumulative += d;
                        cumulative > r
                    })
                    .unwrap_or(n_samples - 1)
            };
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    /// Fit the model (unsupervised, no labels)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 {
            return Err(KolosalError::InvalidParameter {
                name: "n_clusters".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if n_samples < self.n_clusters {
            return Err(KolosalError::ValidationError(format!(
                "n_samples ({}) < n_clusters ({})",
                n_samples, self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _iter in 0..self.max_iter {
            let new_labels: Vec<usize> = (0..n_samples)
                .into_par_iter()
                .map(|i| nearest(x.row(i), &centroids).0)
                .collect();

            let changed = new_labels
                .iter()
                .zip(labels.iter())
                .filter(|(a, b)| a != b)
                .count();
            labels = new_labels;

            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }

            for (c, &count) in counts.iter().enumerate() {
                if count > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / count as f64);
                } else {
                    // empty cluster: restart from a random row
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        // final assignment against the converged centroids
        let assigned: Vec<(usize, f64)> = (0..n_samples)
            .into_par_iter()
            .map(|i| nearest(x.row(i), &centroids))
            .collect();

        self.labels = Some(assigned.iter().map(|(c, _)| *c).collect());
        self.inertia = Some(assigned.iter().map(|(_, d)| d).sum());
        self.centroids = Some(centroids);
        Ok(self)
    }

    /// Nearest centroid per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let centroids = self.centroids.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        if x.ncols() != centroids.ncols() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", centroids.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| nearest(x.row(i), centroids).0)
            .collect())
    }
}

/// Inertia for one value of k
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub inertia: f64,
}

/// Inertia for k = 1..=max_k
pub fn elbow_curve(x: &Array2<f64>, max_k: usize, seed: u64) -> Result<Vec<ElbowPoint>> {
    (1..=max_k.min(x.nrows()))
        .map(|k| {
            let mut model = KMeans::new(k).with_random_state(seed);
            model.fit(x)?;
            Ok(ElbowPoint {
                k,
                inertia: model.inertia().unwrap_or(f64::NAN),
            })
        })
        .collect()
}

/// Mean feature values of the members of each cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub k: usize,
    pub features: Vec<String>,
    /// One row per cluster: (size, per-feature means)
    pub clusters: Vec<(usize, Vec<f64>)>,
}

/// Fit k clusters and average each feature within each cluster
pub fn cluster_profile(
    x: &Array2<f64>,
    features: &[String],
    k: usize,
    seed: u64,
) -> Result<ClusterProfile> {
    let mut model = KMeans::new(k).with_random_state(seed);
    model.fit(x)?;
    let labels = model.labels().ok_or(KolosalError::ModelNotFitted)?;

    let clusters = (0..k)
        .map(|c| {
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == c)
                .map(|(i, _)| i)
                .collect();
            let means = x
                .select(Axis(0), &members)
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::from_elem(x.ncols(), f64::NAN));
            (members.len(), means.to_vec())
        })
        .collect();

    Ok(ClusterProfile {
        k,
        features: features.to_vec(),
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_groups() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1]
        ]
    }

    #[test]
    fn test_kmeans_finds_groups() {
        let x = two_groups();
        let mut model = KMeans::new(2).with_random_state(123);
        model.fit(&x).unwrap();

        let labels = model.labels().unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_ne!(labels[0], labels[3]);
        assert!(model.inertia().unwrap() < 0.1);
    }

    #[test]
    fn test_elbow_is_non_increasing() {
        let curve = elbow_curve(&two_groups(), 4, 123).unwrap();
        assert_eq!(curve.len(), 4);
        assert!(curve[1].inertia < curve[0].inertia);
    }

    #[test]
    fn test_cluster_profile_sizes() {
        let features = vec!["a".to_string(), "b".to_string()];
        let profile = cluster_profile(&two_groups(), &features, 2, 123).unwrap();
        let sizes: usize = profile.clusters.iter().map(|(n, _)| n).sum();
        assert_eq!(sizes, 6);
        assert_eq!(profile.clusters[0].1.len(), 2);
    }

    #[test]
    fn test_too_many_clusters() {
        assert!(KMeans::new(10).fit(&two_groups()).is_err());
    }
}
