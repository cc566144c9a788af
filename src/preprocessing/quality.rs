//! Missing-value detection and the policy applied when it fails.

use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How the preparation step reacts to missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingValuePolicy {
    /// Abort with a `DataQualityError`
    #[default]
    Fail,
    /// Log a warning and drop incomplete rows (no imputation)
    DropRows,
}

/// Null count for a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub column: String,
    pub null_count: usize,
}

/// Missing-value status of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueReport {
    /// Rows inspected
    pub num_rows: usize,
    /// Columns inspected
    pub num_columns: usize,
    /// Columns with at least one null, in frame order
    pub columns: Vec<ColumnMissing>,
    /// Rows removed by `MissingValuePolicy::DropRows`
    pub rows_dropped: usize,
}

impl MissingValueReport {
    /// Inspect every column of a frame
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .filter_map(|column| {
                let null_count = column.null_count();
                (null_count > 0).then(|| ColumnMissing {
                    column: column.name().to_string(),
                    null_count,
                })
            })
            .collect();

        Self {
            num_rows: df.height(),
            num_columns: df.width(),
            columns,
            rows_dropped: 0,
        }
    }

    pub fn has_missing(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }

    pub fn affected_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }
}

/// Check a frame for missing values and apply `policy`
pub fn enforce_policy(
    df: DataFrame,
    policy: MissingValuePolicy,
) -> Result<(DataFrame, MissingValueReport)> {
    let mut report = MissingValueReport::from_frame(&df);

    if !report.has_missing() {
        info!(rows = report.num_rows, "no missing values found");
        return Ok((df, report));
    }

    match policy {
        MissingValuePolicy::Fail => Err(KolosalError::DataQualityError {
            columns: report.affected_columns(),
        }),
        MissingValuePolicy::DropRows => {
            let cleaned = df.drop_nulls::<String>(None)?;
            report.rows_dropped = df.height() - cleaned.height();
            warn!(
                columns = ?report.affected_columns(),
                missing = report.total_missing(),
                rows_dropped = report.rows_dropped,
                "missing values found, dropping incomplete rows"
            );
            Ok((cleaned, report))
        }
    }
}
