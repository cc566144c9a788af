//! Seeded train/test partitioning

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Disjoint training and holdout partitions with the source row indices
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Rows assigned to the holdout set: ceil(n * test_size)
pub fn test_count(n_samples: usize, test_size: f64) -> usize {
    (n_samples as f64 * test_size).ceil() as usize
}

/// Shuffle rows with a seeded RNG and cut off `test_size` of them.
///
/// With `stratify` the holdout takes the same share from every class,
/// distributing rounding remainders by largest fractional part.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
    stratify: bool,
) -> Result<TrainTestSplit> {
    let n_samples = x.nrows();
    if n_samples != y.len() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} labels", n_samples),
            actual: format!("{} labels", y.len()),
        });
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(KolosalError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n_test = test_count(n_samples, test_size);
    if n_test == 0 || n_test >= n_samples {
        return Err(KolosalError::DataError(format!(
            "test_size {} leaves {} of {} rows for testing",
            test_size, n_test, n_samples
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (mut train_indices, mut test_indices) = if stratify {
        stratified_partition(y, n_test, &mut rng)
    } else {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut rng);
        let train = indices.split_off(n_test);
        (train, indices)
    };

    // keep source order inside each partition
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}

fn stratified_partition(
    y: &Array1<f64>,
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<usize>) {
    let n_samples = y.len();
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, label) in y.iter().enumerate() {
        by_class.entry(*label as i64).or_default().push(i);
    }

    // floor allocation, then hand out the remainder by largest fraction
    let mut allocation: Vec<(i64, usize, f64)> = by_class
        .iter()
        .map(|(label, rows)| {
            let exact = rows.len() as f64 * n_test as f64 / n_samples as f64;
            (*label, exact.floor() as usize, exact - exact.floor())
        })
        .collect();
    let assigned: usize = allocation.iter().map(|(_, n, _)| n).sum();
    let mut order: Vec<usize> = (0..allocation.len()).collect();
    order.sort_by(|&a, &b| {
        allocation[b]
            .2
            .partial_cmp(&allocation[a].2)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for &i in order.iter().take(n_test.saturating_sub(assigned)) {
        allocation[i].1 += 1;
    }

    let mut train = Vec::with_capacity(n_samples - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (label, take, _) in allocation {
        if let Some(rows) = by_class.get_mut(&label) {
            rows.shuffle(rng);
            let take = take.min(rows.len());
            test.extend_from_slice(&rows[..take]);
            train.extend_from_slice(&rows[take..]);
        }
    }
    (train, test)
}
