//! Binary classification metrics

use crate::error::{KolosalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Label names in class order (0 then 1)
pub const CLASS_NAMES: [&str; 2] = ["Stayed", "Left"];

fn check_lengths(a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(KolosalError::ShapeError {
            expected: format!("{} predictions", a),
            actual: format!("{} predictions", b),
        });
    }
    if a == 0 {
        return Err(KolosalError::ValidationError(
            "cannot score an empty set".to_string(),
        ));
    }
    Ok(())
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Fraction of exact label matches
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// 2x2 confusion matrix, positive class = departed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Metrics for class 0 (`positive = false`) or class 1
    fn class_metrics(&self, positive: bool) -> ClassMetrics {
        let (tp, fp, fn_) = if positive {
            (self.true_positive, self.false_positive, self.false_negative)
        } else {
            (self.true_negative, self.false_negative, self.false_positive)
        };
        let precision = safe_div(tp as f64, (tp + fp) as f64);
        let recall = safe_div(tp as f64, (tp + fn_) as f64);
        ClassMetrics {
            label: CLASS_NAMES[positive as usize].to_string(),
            precision,
            recall,
            f1: safe_div(2.0 * precision * recall, precision + recall),
            support: tp + fn_,
        }
    }
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged per-class metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl AverageMetrics {
    fn macro_average(classes: &[ClassMetrics]) -> Self {
        let n = classes.len().max(1) as f64;
        Self {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
        }
    }

    fn weighted_average(classes: &[ClassMetrics]) -> Self {
        let total = classes.iter().map(|c| c.support).sum::<usize>() as f64;
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            safe_div(
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>(),
                total,
            )
        };
        Self {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
        }
    }
}

/// Per-class report for both classes, in class order
pub fn classification_report(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
) -> Result<Vec<ClassMetrics>> {
    let cm = ConfusionMatrix::from_labels(y_true, y_pred)?;
    Ok(vec![cm.class_metrics(false), cm.class_metrics(true)])
}

/// Recall of the positive class
pub fn recall_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(ConfusionMatrix::from_labels(y_true, y_pred)?
        .class_metrics(true)
        .recall)
}

/// Positive-class probabilities must be finite and within [0, 1]
pub fn check_probabilities(scores: &Array1<f64>) -> Result<()> {
    match scores.iter().find(|p| !(p.is_finite() && (0.0..=1.0).contains(*p))) {
        Some(bad) => Err(KolosalError::ValidationError(format!(
            "probability {} outside [0, 1]",
            bad
        ))),
        None => Ok(()),
    }
}

/// Average ranks (1-based), ties share their mean rank
fn average_ranks(scores: &Array1<f64>) -> Vec<f64> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Area under the ROC curve via the Mann-Whitney rank statistic.
///
/// Fails when `y_true` holds a single class.
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true.len(), scores.len())?;
    let n_pos = y_true.iter().filter(|v| **v > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(KolosalError::ValidationError(
            "ROC AUC is undefined when only one class is present".to_string(),
        ));
    }

    let ranks = average_ranks(scores);
    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

/// ROC curve points at every distinct score threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Descending; the first entry is `max(score) + 1` so the curve starts at (0, 0)
    pub thresholds: Vec<f64>,
}

pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<RocCurve> {
    check_lengths(y_true.len(), scores.len())?;
    let n_pos = y_true.iter().filter(|v| **v > 0.5).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let top = scores[order[0]];
    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![top + 1.0],
    };

    let (mut tp, mut fp) = (0.0, 0.0);
    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] > 0.5 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_threshold = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_threshold {
            curve.fpr.push(safe_div(fp, n_neg));
            curve.tpr.push(safe_div(tp, n_pos));
            curve.thresholds.push(scores[idx]);
        }
    }
    Ok(curve)
}

/// Holdout metrics of a fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub n_samples: usize,
    pub accuracy: f64,
    /// Stayed, then Left
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub roc_auc: f64,
    pub confusion: ConfusionMatrix,
    pub roc_curve: RocCurve,
}

impl ClassificationMetrics {
    /// Compute from hard labels and positive-class probabilities
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_proba: &Array1<f64>,
    ) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;
        check_lengths(y_true.len(), y_proba.len())?;
        check_probabilities(y_proba)?;

        let confusion = ConfusionMatrix::from_labels(y_true, y_pred)?;
        let per_class = vec![confusion.class_metrics(false), confusion.class_metrics(true)];

        Ok(Self {
            n_samples: y_true.len(),
            accuracy: accuracy_score(y_true, y_pred)?,
            macro_avg: AverageMetrics::macro_average(&per_class),
            weighted_avg: AverageMetrics::weighted_average(&per_class),
            per_class,
            roc_auc: roc_auc_score(y_true, y_proba)?,
            confusion,
            roc_curve: roc_curve(y_true, y_proba)?,
        })
    }

    /// Metrics of the departed class
    pub fn positive(&self) -> &ClassMetrics {
        &self.per_class[1]
    }
}
