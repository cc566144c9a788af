//! Workflow configuration

use crate::error::{KolosalError, Result};
use crate::preprocessing::MissingValuePolicy;
use crate::training::ModelId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default seed shared by the split, oversampling and stochastic estimators
pub const DEFAULT_RANDOM_STATE: u64 = 123;

/// Configuration for an end-to-end attrition run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset location: a local CSV path or an http(s) URL
    pub data_source: String,

    /// Fraction of rows held out for evaluation and segmentation
    pub test_size: f64,

    /// Seed for every random process in the run
    pub random_state: u64,

    /// Number of stratified cross-validation folds used by grid search
    pub cv_folds: usize,

    /// Neighbours considered when interpolating synthetic minority rows
    pub smote_k_neighbors: usize,

    /// Candidate models, evaluated in this order
    pub models: Vec<ModelId>,

    /// What to do when the dataset has missing values
    pub missing_values: MissingValuePolicy,

    /// Preserve the class ratio in the train/test split
    pub stratify_split: bool,

    /// Features averaged per risk tier in the segmentation profile
    pub profile_features: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_source: "HR_comma_sep.csv".to_string(),
            test_size: 0.2,
            random_state: DEFAULT_RANDOM_STATE,
            cv_folds: 5,
            smote_k_neighbors: 5,
            models: ModelId::ALL.to_vec(),
            missing_values: MissingValuePolicy::Fail,
            stratify_split: false,
            profile_features: vec![
                "satisfaction_level".to_string(),
                "last_evaluation".to_string(),
                "number_project".to_string(),
                "average_monthly_hours".to_string(),
            ],
        }
    }
}

impl PipelineConfig {
    /// Create a configuration reading from `data_source`
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_smote_k_neighbors(mut self, k: usize) -> Self {
        self.smote_k_neighbors = k;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelId>) -> Self {
        self.models = models;
        self
    }

    pub fn with_missing_values(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_values = policy;
        self
    }

    pub fn with_stratified_split(mut self, stratify: bool) -> Self {
        self.stratify_split = stratify;
        self
    }

    /// Check value ranges before any data is touched
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(KolosalError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(KolosalError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.smote_k_neighbors == 0 {
            return Err(KolosalError::ConfigError(
                "smote_k_neighbors must be at least 1".to_string(),
            ));
        }
        if self.models.is_empty() {
            return Err(KolosalError::ConfigError(
                "at least one model must be selected".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.smote_k_neighbors, 5);
        assert_eq!(config.models, ModelId::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new("data.csv")
            .with_cv_folds(3)
            .with_random_state(7)
            .with_models(vec![ModelId::LogisticRegression]);

        assert_eq!(config.data_source, "data.csv");
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.random_state, 7);
        assert_eq!(config.models.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PipelineConfig::default().with_test_size(1.0).validate().is_err());
        assert!(PipelineConfig::default().with_cv_folds(1).validate().is_err());
        assert!(PipelineConfig::default().with_smote_k_neighbors(0).validate().is_err());
        assert!(PipelineConfig::default().with_models(vec![]).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"data_source": "hr.csv", "models": ["RF"]}"#).unwrap();
        assert_eq!(config.data_source, "hr.csv");
        assert_eq!(config.models, vec![ModelId::RandomForest]);
        assert_eq!(config.cv_folds, 5);
    }
}
