//! End-to-end attrition run
//!
//! prepare -> split -> oversample (training rows only) -> grid search per
//! model -> best model by CV score -> holdout segmentation

use crate::analysis::{profile_dataset, ClassBalance, DatasetProfile, ProfileOptions};
use crate::config::PipelineConfig;
use crate::error::{KolosalError, Result};
use crate::evaluation::{EvaluationHarness, EvaluationResult, FittedPipeline};
use crate::preprocessing::{train_test_split, DataPreparer, MissingValueReport, PreparedDataset};
use crate::segmentation::{segment, RiskSegmentation};
use crate::synthetic::{class_counts, class_labels, Sampler, SMOTE};
use crate::training::ModelId;
use crate::utils::{DataLoader, DataSource, Timer};
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything a run produces, ready for rendering or JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub config: PipelineConfig,
    pub n_rows: usize,
    pub feature_names: Vec<String>,
    pub missing: MissingValueReport,
    pub n_train: usize,
    pub n_test: usize,
    /// Training labels before oversampling
    pub train_balance: ClassBalance,
    /// Training labels after oversampling
    pub resampled_balance: ClassBalance,
    pub n_synthetic: usize,
    /// One entry per configured model, in configuration order
    pub results: Vec<EvaluationResult>,
    pub best_model: ModelId,
    /// Holdout population scored by the best model
    pub segmentation: RiskSegmentation,
    pub elapsed_secs: f64,
}

impl WorkflowReport {
    pub fn best_result(&self) -> Option<&EvaluationResult> {
        self.results
            .iter()
            .find(|r| r.best_config.model_id() == self.best_model)
    }
}

fn balance(y: &Array1<f64>) -> ClassBalance {
    let departed = y.iter().filter(|v| **v == 1.0).count();
    ClassBalance {
        retained: y.len() - departed,
        departed,
    }
}

/// Highest CV score wins; equal scores go to the earlier registry entry
fn select_best(results: &[(ModelId, f64)]) -> Option<ModelId> {
    results
        .iter()
        .copied()
        .fold(None, |best: Option<(ModelId, f64)>, (id, score)| match best {
            Some((best_id, best_score))
                if score < best_score || (score == best_score && best_id < id) =>
            {
                best
            }
            _ => Some((id, score)),
        })
        .map(|(id, _)| id)
}

/// Runs the configured workflow
#[derive(Debug, Clone)]
pub struct AttritionWorkflow {
    config: PipelineConfig,
    loader: DataLoader,
}

impl AttritionWorkflow {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loader: DataLoader::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn load_and_prepare(&self) -> Result<PreparedDataset> {
        let source = DataSource::parse(&self.config.data_source);
        let raw = self.loader.load(&source)?;
        DataPreparer::new(self.config.missing_values).prepare(raw)
    }

    /// Load the configured source and run
    pub fn run(&self) -> Result<(FittedPipeline, WorkflowReport)> {
        let timer = Timer::start();
        let prepared = self.load_and_prepare()?;
        self.run_prepared(prepared, timer)
    }

    /// Run on an already loaded frame
    pub fn run_on(&self, raw: DataFrame) -> Result<(FittedPipeline, WorkflowReport)> {
        let timer = Timer::start();
        let prepared = DataPreparer::new(self.config.missing_values).prepare(raw)?;
        self.run_prepared(prepared, timer)
    }

    /// Exploratory profile of the configured source, no training
    pub fn profile(&self, options: &ProfileOptions) -> Result<DatasetProfile> {
        profile_dataset(&self.load_and_prepare()?, options)
    }

    fn run_prepared(
        &self,
        prepared: PreparedDataset,
        timer: Timer,
    ) -> Result<(FittedPipeline, WorkflowReport)> {
        let cfg = &self.config;
        let data = &prepared.encoded;
        if prepared.missing.has_missing() {
            warn!(
                columns = ?prepared.missing.affected_columns(),
                rows_dropped = prepared.missing.rows_dropped,
                "missing values handled by policy"
            );
        } else {
            info!("no missing values");
        }

        let split = train_test_split(
            &data.x,
            &data.y,
            cfg.test_size,
            cfg.random_state,
            cfg.stratify_split,
        )?;
        let train_balance = balance(&split.y_train);
        info!(
            train = split.x_train.nrows(),
            test = split.x_test.nrows(),
            retained = train_balance.retained,
            departed = train_balance.departed,
            "train/test split"
        );

        let resampled = SMOTE::new()
            .with_k_neighbors(cfg.smote_k_neighbors)
            .with_seed(cfg.random_state)
            .fit_resample(&split.x_train, &class_labels(&split.y_train))?;
        let y_resampled = resampled.y_f64();
        let resampled_balance = balance(&y_resampled);
        info!(
            counts = ?class_counts(&resampled.y),
            synthetic = resampled.total_synthetic(),
            "training set oversampled"
        );

        let harness = EvaluationHarness::new(cfg.cv_folds, cfg.random_state);
        let mut fitted = Vec::with_capacity(cfg.models.len());
        let mut results = Vec::with_capacity(cfg.models.len());
        for &model in &cfg.models {
            let (pipeline, result) = harness.run(
                model,
                &resampled.x,
                &y_resampled,
                &split.x_test,
                &split.y_test,
            )?;
            fitted.push((model, pipeline));
            results.push(result);
        }

        let scores: Vec<(ModelId, f64)> = cfg
            .models
            .iter()
            .copied()
            .zip(results.iter().map(|r| r.best_score))
            .collect();
        let best_model = select_best(&scores).ok_or_else(|| {
            KolosalError::ConfigError("at least one model must be selected".to_string())
        })?;
        let best_pipeline = fitted
            .into_iter()
            .find(|(id, _)| *id == best_model)
            .map(|(_, p)| p)
            .ok_or(KolosalError::ModelNotFitted)?;
        info!(model = best_model.code(), "best model selected");

        let segmentation = segment(
            &best_pipeline,
            &split.x_test,
            &data.feature_names,
            &cfg.profile_features,
        )
        .map_err(|e| e.in_stage(best_model.code(), "segmentation"))?;

        let report = WorkflowReport {
            config: cfg.clone(),
            n_rows: data.n_samples(),
            feature_names: data.feature_names.clone(),
            missing: prepared.missing.clone(),
            n_train: split.x_train.nrows(),
            n_test: split.x_test.nrows(),
            train_balance,
            resampled_balance,
            n_synthetic: resampled.total_synthetic(),
            results,
            best_model,
            segmentation,
            elapsed_secs: timer.elapsed_secs(),
        };
        info!(elapsed_secs = report.elapsed_secs, "workflow complete");
        Ok((best_pipeline, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_best_prefers_registry_order_on_ties() {
        let scores = [
            (ModelId::GradientBoosting, 0.9),
            (ModelId::RandomForest, 0.9),
            (ModelId::LogisticRegression, 0.8),
        ];
        assert_eq!(select_best(&scores), Some(ModelId::RandomForest));
    }

    #[test]
    fn test_select_best_highest_score() {
        let scores = [
            (ModelId::LogisticRegression, 0.7),
            (ModelId::GradientBoosting, 0.95),
        ];
        assert_eq!(select_best(&scores), Some(ModelId::GradientBoosting));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_new_validates_config() {
        let config = PipelineConfig::default().with_cv_folds(1);
        assert!(matches!(
            AttritionWorkflow::new(config),
            Err(KolosalError::ConfigError(_))
        ));
    }
}
