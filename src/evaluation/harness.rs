//! Grid search with stratified cross-validation, refit and holdout scoring

use super::metrics::{
    accuracy_score, classification_report, recall_score, roc_auc_score, ClassificationMetrics,
};
use super::pipeline::{FittedPipeline, Pipeline};
use crate::config::DEFAULT_RANDOM_STATE;
use crate::error::{KolosalError, Result};
use crate::training::{
    check_stratifiable, CVResults, CVSplit, CVStrategy, Classifier, CrossValidator, ModelConfig,
    ModelId,
};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cross-validated score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub config: ModelConfig,
    pub cv: CVResults,
    /// 1 = best; equal means share the lowest rank
    pub rank: usize,
}

/// Fold means of the secondary scorers for the winning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationSummary {
    pub accuracy: CVResults,
    pub recall: CVResults,
    pub roc_auc: CVResults,
    pub precision_macro: CVResults,
    pub recall_macro: CVResults,
}

/// Outcome of searching and evaluating one model family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model: String,
    pub best_config: ModelConfig,
    /// Mean CV accuracy of `best_config`
    pub best_score: f64,
    pub candidates: Vec<CandidateResult>,
    pub cross_validation: Option<CrossValidationSummary>,
    pub test_metrics: Option<ClassificationMetrics>,
}

/// Stateless search/evaluate driver; every call builds fresh pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationHarness {
    pub cv_folds: usize,
    pub random_state: u64,
}

impl Default for EvaluationHarness {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

fn rows(x: &Array2<f64>, idx: &[usize]) -> Array2<f64> {
    x.select(Axis(0), idx)
}

fn labels(y: &Array1<f64>, idx: &[usize]) -> Array1<f64> {
    y.select(Axis(0), idx)
}

/// Rank 1 for the highest mean, ties share the lowest rank
fn ranks(means: &[f64]) -> Vec<usize> {
    means
        .iter()
        .map(|m| 1 + means.iter().filter(|other| *other > m).count())
        .collect()
}

/// Index of the first strict maximum
fn first_best(means: &[f64]) -> Option<usize> {
    means
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &m)| match best {
            Some((_, b)) if m <= b => best,
            _ => Some((i, m)),
        })
        .map(|(i, _)| i)
}

impl EvaluationHarness {
    pub fn new(cv_folds: usize, random_state: u64) -> Self {
        Self {
            cv_folds,
            random_state,
        }
    }

    fn folds(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        CrossValidator::new(CVStrategy::stratified(self.cv_folds))
            .with_random_state(self.random_state)
            .split(y)
    }

    /// Grid-search the registry grid of `model`, then refit the winner on
    /// all of `x_train`.
    pub fn search_best(
        &self,
        model: ModelId,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
    ) -> Result<(FittedPipeline, EvaluationResult)> {
        let seed = self.random_state;
        self.search_with(
            model.code(),
            &model.param_grid(),
            |config| config.build(seed),
            x_train,
            y_train,
        )
    }

    /// Grid search over an explicit grid and estimator factory.
    ///
    /// Fold counts and probability support are checked before any fit.
    /// Candidates x folds are trained in parallel and collected in grid
    /// order, so the winner is the first combination reaching the best
    /// mean accuracy.
    pub fn search_with<F>(
        &self,
        label: &str,
        grid: &[ModelConfig],
        build: F,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
    ) -> Result<(FittedPipeline, EvaluationResult)>
    where
        F: Fn(&ModelConfig) -> Box<dyn Classifier> + Sync,
    {
        let in_search = |e: KolosalError| e.in_stage(label, "grid search");

        if grid.is_empty() {
            return Err(in_search(KolosalError::ConfigError(
                "empty hyperparameter grid".to_string(),
            )));
        }
        if x_train.nrows() != y_train.len() {
            return Err(in_search(KolosalError::ShapeError {
                expected: format!("{} labels", x_train.nrows()),
                actual: format!("{} labels", y_train.len()),
            }));
        }
        check_stratifiable(y_train, self.cv_folds).map_err(in_search)?;
        for config in grid {
            Pipeline::new(build(config)).map_err(in_search)?;
        }

        let splits = self.folds(y_train).map_err(in_search)?;
        let tasks: Vec<(usize, &CVSplit)> = (0..grid.len())
            .flat_map(|c| splits.iter().map(move |s| (c, s)))
            .collect();

        let scores: Vec<f64> = tasks
            .par_iter()
            .map(|&(c, split)| {
                let fitted = Pipeline::new(build(&grid[c]))?.fit(
                    &rows(x_train, &split.train_indices),
                    &labels(y_train, &split.train_indices),
                )?;
                let x_val = rows(x_train, &split.test_indices);
                accuracy_score(&labels(y_train, &split.test_indices), &fitted.predict(&x_val)?)
            })
            .collect::<Result<Vec<_>>>()
            .map_err(in_search)?;

        let n_folds = splits.len();
        let cvs: Vec<CVResults> = scores
            .chunks(n_folds)
            .map(|chunk| CVResults::from_scores(chunk.to_vec()))
            .collect();
        let means: Vec<f64> = cvs.iter().map(|cv| cv.mean_score).collect();
        let candidate_ranks = ranks(&means);

        let candidates: Vec<CandidateResult> = grid
            .iter()
            .zip(cvs)
            .zip(candidate_ranks)
            .map(|((config, cv), rank)| {
                debug!(model = label, %config, mean = cv.mean_score, std = cv.std_score, "candidate scored");
                CandidateResult {
                    config: *config,
                    cv,
                    rank,
                }
            })
            .collect();

        let best = first_best(&means).ok_or_else(|| {
            in_search(KolosalError::ComputationError(
                "no candidate produced a score".to_string(),
            ))
        })?;
        let best_config = grid[best];
        let best_score = means[best];
        info!(model = label, best = %best_config, cv_accuracy = best_score, "grid search complete");

        let fitted = Pipeline::new(build(&best_config))
            .map(|p| p.with_config(best_config))
            .and_then(|p| p.fit(x_train, y_train))
            .map_err(|e| e.in_stage(label, "refit"))?;

        Ok((
            fitted,
            EvaluationResult {
                model: label.to_string(),
                best_config,
                best_score,
                candidates,
                cross_validation: None,
                test_metrics: None,
            },
        ))
    }

    /// Holdout metrics from predicted labels and departure probabilities
    pub fn evaluate(
        &self,
        pipeline: &FittedPipeline,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<ClassificationMetrics> {
        let proba = pipeline.predict_proba(x_test)?;
        let pred = pipeline.predict(x_test)?;
        ClassificationMetrics::compute(y_test, &pred, &proba)
    }

    /// Secondary scorers for one configuration over the same folds
    pub fn cross_validate(
        &self,
        config: &ModelConfig,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
    ) -> Result<CrossValidationSummary> {
        check_stratifiable(y_train, self.cv_folds)?;
        Pipeline::from_config(*config, self.random_state)?;
        let splits = self.folds(y_train)?;

        // [accuracy, recall, roc_auc, precision_macro, recall_macro] per fold
        let per_fold: Vec<[f64; 5]> = splits
            .par_iter()
            .map(|split| {
                let fitted = Pipeline::from_config(*config, self.random_state)?.fit(
                    &rows(x_train, &split.train_indices),
                    &labels(y_train, &split.train_indices),
                )?;
                let x_val = rows(x_train, &split.test_indices);
                let y_val = labels(y_train, &split.test_indices);
                let pred = fitted.predict(&x_val)?;
                let proba = fitted.predict_proba(&x_val)?;
                let report = classification_report(&y_val, &pred)?;
                let n = report.len() as f64;
                Ok([
                    accuracy_score(&y_val, &pred)?,
                    recall_score(&y_val, &pred)?,
                    roc_auc_score(&y_val, &proba)?,
                    report.iter().map(|c| c.precision).sum::<f64>() / n,
                    report.iter().map(|c| c.recall).sum::<f64>() / n,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        let column = |k: usize| CVResults::from_scores(per_fold.iter().map(|f| f[k]).collect());
        Ok(CrossValidationSummary {
            accuracy: column(0),
            recall: column(1),
            roc_auc: column(2),
            precision_macro: column(3),
            recall_macro: column(4),
        })
    }

    /// Search, secondary CV and holdout evaluation for one model family
    pub fn run(
        &self,
        model: ModelId,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(FittedPipeline, EvaluationResult)> {
        let (fitted, mut result) = self.search_best(model, x_train, y_train)?;

        let summary = self
            .cross_validate(&result.best_config, x_train, y_train)
            .map_err(|e| e.in_stage(model.code(), "cross-validation"))?;
        let metrics = self
            .evaluate(&fitted, x_test, y_test)
            .map_err(|e| e.in_stage(model.code(), "holdout evaluation"))?;

        info!(
            model = model.code(),
            accuracy = metrics.accuracy,
            roc_auc = metrics.roc_auc,
            recall = metrics.positive().recall,
            "holdout evaluation"
        );

        result.cross_validation = Some(summary);
        result.test_metrics = Some(metrics);
        Ok((fitted, result))
    }
}
