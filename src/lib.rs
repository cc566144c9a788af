//! Kolosal Attrition - employee attrition modelling on the Kolosal engine
//!
//! Loads an HR dataset, trains several candidate classifiers under a shared
//! stratified cross-validation protocol, selects the best one and buckets
//! the current workforce into retention-risk tiers.
//!
//! # Modules
//!
//! ## Data
//! - [`preprocessing`] - Column normalization, missing-value policy, encoding, split, scaling
//! - [`synthetic`] - SMOTE oversampling of the training partition
//! - [`analysis`] - Crosstabs, summaries and k-means profiling
//!
//! ## Modelling
//! - [`training`] - Estimators, cross-validation and the model registry
//! - [`evaluation`] - Scaling pipelines, grid search and holdout metrics
//! - [`segmentation`] - Probability-based risk tiers
//!
//! ## Orchestration
//! - [`workflow`] - End-to-end run
//! - [`reporting`] - Console rendering
//! - [`cli`] - Command-line interface

// Core error handling and configuration
pub mod config;
pub mod error;

// Data
pub mod analysis;
pub mod preprocessing;
pub mod synthetic;
pub mod utils;

// Modelling
pub mod evaluation;
pub mod segmentation;
pub mod training;

// Orchestration
pub mod cli;
pub mod reporting;
pub mod workflow;

pub use error::{KolosalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling and configuration
    pub use crate::config::{PipelineConfig, DEFAULT_RANDOM_STATE};
    pub use crate::error::{KolosalError, Result};

    // Data preparation
    pub use crate::preprocessing::{
        train_test_split, DataPreparer, EncodedDataset, MissingValuePolicy, PreparedDataset,
        StandardScaler,
    };
    pub use crate::utils::{DataLoader, DataSource};

    // Oversampling
    pub use crate::synthetic::{Sampler, SMOTE};

    // Training
    pub use crate::training::{Classifier, CrossValidator, CVStrategy, ModelConfig, ModelId};

    // Evaluation
    pub use crate::evaluation::{
        ClassificationMetrics, EvaluationHarness, EvaluationResult, FittedPipeline, Pipeline,
    };

    // Segmentation
    pub use crate::segmentation::{segment, RiskSegmentation, RiskTier};

    // Analysis
    pub use crate::analysis::{profile_dataset, DatasetProfile, ProfileOptions};

    // Workflow
    pub use crate::workflow::{AttritionWorkflow, WorkflowReport};
}
