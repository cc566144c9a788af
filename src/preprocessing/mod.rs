//! Data preparation module
//!
//! Turns a raw HR frame into a numeric feature matrix:
//! - Column normalization (legacy and misspelled headers)
//! - Missing-value detection with an explicit policy
//! - Department consolidation
//! - Ordinal salary and one-hot department encoding
//! - Seeded train/test partitioning and standardization

mod encoder;
mod quality;
mod scaler;
pub mod schema;
mod split;

pub use encoder::{salary_code, EncodedDataset, FeatureEncoder, SALARY_ORDER};
pub(crate) use encoder::numeric_values;
pub use quality::{enforce_policy, ColumnMissing, MissingValuePolicy, MissingValueReport};
pub use scaler::StandardScaler;
pub use schema::{consolidate_departments, normalize_columns, select_model_columns};
pub use split::{test_count, train_test_split, TrainTestSplit};

use crate::error::Result;
use polars::prelude::*;
use tracing::info;

/// Output of data preparation
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    /// Normalized frame with consolidated categories, before encoding
    pub frame: DataFrame,
    /// Numeric projection with the isolated target
    pub encoded: EncodedDataset,
    /// Missing-value status of the raw rows
    pub missing: MissingValueReport,
    /// Encoder fitted on `frame`
    pub encoder: FeatureEncoder,
}

/// Runs normalization, quality checks and encoding in a fixed order
#[derive(Debug, Clone, Default)]
pub struct DataPreparer {
    policy: MissingValuePolicy,
}

impl DataPreparer {
    pub fn new(policy: MissingValuePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingValuePolicy {
        self.policy
    }

    /// Prepare a raw frame
    pub fn prepare(&self, raw: DataFrame) -> Result<PreparedDataset> {
        let frame = select_model_columns(normalize_columns(raw)?)?;
        let (frame, missing) = enforce_policy(frame, self.policy)?;
        let frame = consolidate_departments(frame)?;

        let mut encoder = FeatureEncoder::new();
        let encoded = encoder.fit_transform(&frame)?;

        info!(
            rows = encoded.n_samples(),
            features = encoded.n_features(),
            departments = encoder.departments().len(),
            "data prepared"
        );

        Ok(PreparedDataset {
            frame,
            encoded,
            missing,
            encoder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KolosalError;

    fn raw() -> DataFrame {
        df!(
            "satisfaction_level" => &[Some(0.38), Some(0.8), Some(0.11)],
            "last_evaluation" => &[0.53, 0.86, 0.88],
            "number_project" => &[2i64, 5, 7],
            "average_montly_hours" => &[157i64, 262, 272],
            "time_spend_company" => &[3i64, 6, 4],
            "Work_accident" => &[0i64, 0, 1],
            "left" => &[1i64, 1, 0],
            "promotion_last_5years" => &[0i64, 0, 0],
            "sales" => &["sales", "IT", "support"],
            "salary" => &["low", "medium", "high"]
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_merges_departments() {
        let prepared = DataPreparer::default().prepare(raw()).unwrap();
        assert_eq!(prepared.encoder.departments(), &["sales", "technical"]);
        assert_eq!(prepared.encoded.n_samples(), 3);
        assert!(prepared.encoded.feature_index("department_IT").is_none());
        assert!(!prepared.missing.has_missing());
    }

    #[test]
    fn test_prepare_ignores_row_id_column() {
        let mut df = raw();
        df.with_column(Series::new("row_id".into(), &[10i64, 11, 12]))
            .unwrap();
        let prepared = DataPreparer::default().prepare(df).unwrap();
        let baseline = DataPreparer::default().prepare(raw()).unwrap();

        assert!(prepared.encoded.feature_index("row_id").is_none());
        assert_eq!(prepared.encoded.feature_names, baseline.encoded.feature_names);
        assert_eq!(prepared.encoded.x, baseline.encoded.x);
    }

    #[test]
    fn test_prepare_fails_on_missing_by_default() {
        let mut df = raw();
        df.with_column(Series::new(
            "satisfaction_level".into(),
            &[Some(0.38), None, Some(0.11)],
        ))
        .unwrap();
        let err = DataPreparer::default().prepare(df).unwrap_err();
        assert!(matches!(err, KolosalError::DataQualityError { .. }));
    }

    #[test]
    fn test_prepare_drops_rows_when_allowed() {
        let mut df = raw();
        df.with_column(Series::new(
            "satisfaction_level".into(),
            &[Some(0.38), None, Some(0.11)],
        ))
        .unwrap();
        let prepared = DataPreparer::new(MissingValuePolicy::DropRows)
            .prepare(df)
            .unwrap();
        assert_eq!(prepared.encoded.n_samples(), 2);
        assert_eq!(prepared.missing.rows_dropped, 1);
    }
}
