//! Error types for the attrition pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for the attrition pipeline
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    /// A required column is absent or ambiguous after normalization
    #[error("Schema error: column '{column}' {detail}")]
    SchemaError { column: String, detail: String },

    /// Missing values found where none are tolerated
    #[error("Data quality error: missing values in columns [{}]", columns.join(", "))]
    DataQualityError { columns: Vec<String> },

    /// Requested fold count cannot be stratified over the class counts
    #[error(
        "Fold count error: {n_splits} folds requested but class {class_label} has only {class_count} samples"
    )]
    FoldCountError {
        n_splits: usize,
        class_label: i64,
        class_count: usize,
    },

    /// Estimator lacks an output the caller depends on
    #[error("Capability error: estimator '{estimator}' does not support {capability}")]
    CapabilityError {
        estimator: String,
        capability: String,
    },

    /// Failure raised while a model was in a given stage
    #[error("{model} failed during {stage}: {source}")]
    Stage {
        model: String,
        stage: &'static str,
        #[source]
        source: Box<KolosalError>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl KolosalError {
    /// Attach the model identifier and stage the error surfaced in
    pub fn in_stage(self, model: impl Into<String>, stage: &'static str) -> Self {
        KolosalError::Stage {
            model: model.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping stage wrappers
    pub fn root(&self) -> &KolosalError {
        match self {
            KolosalError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<polars::prelude::PolarsError> for KolosalError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
