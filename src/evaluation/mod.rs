//! Model evaluation: scaling pipelines, grid search and holdout metrics

mod harness;
pub mod metrics;
mod pipeline;

pub use harness::{CandidateResult, CrossValidationSummary, EvaluationHarness, EvaluationResult};
pub use metrics::{
    accuracy_score, classification_report, roc_auc_score, roc_curve, AverageMetrics,
    ClassMetrics, ClassificationMetrics, ConfusionMatrix, RocCurve,
};
pub use pipeline::{FittedPipeline, Pipeline};
