//! Exploratory summaries of a prepared HR dataset
//!
//! Class balance, turnover crosstabs, per-column statistics and k-means
//! structure over satisfaction/evaluation/turnover.

mod clustering;

pub use clustering::{cluster_profile, elbow_curve, ClusterProfile, ElbowPoint, KMeans};

use crate::config::DEFAULT_RANDOM_STATE;
use crate::error::{KolosalError, Result};
use crate::preprocessing::schema::{DEPARTMENT_COLUMN, SALARY_COLUMN, TARGET_COLUMN};
use crate::preprocessing::{numeric_values, salary_code, MissingValueReport, PreparedDataset};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::info;

/// Retained vs departed counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBalance {
    pub retained: usize,
    pub departed: usize,
}

impl ClassBalance {
    pub fn total(&self) -> usize {
        self.retained + self.departed
    }

    pub fn departure_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.departed as f64 / self.total() as f64
        }
    }
}

/// Turnover counts for one category value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosstabRow {
    pub category: String,
    pub retained: usize,
    pub departed: usize,
}

impl CrosstabRow {
    pub fn departure_rate(&self) -> f64 {
        let total = self.retained + self.departed;
        if total == 0 {
            0.0
        } else {
            self.departed as f64 / total as f64
        }
    }
}

/// Turnover by the values of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crosstab {
    pub column: String,
    pub rows: Vec<CrosstabRow>,
}

/// count/mean/std/min/max of a numeric column (sample std)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// What `profile_dataset` computes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOptions {
    /// Elbow curve covers k = 1..=elbow_max_k
    pub elbow_max_k: usize,
    /// Cluster counts to profile
    pub cluster_ks: Vec<usize>,
    /// Columns clustered on
    pub cluster_features: Vec<String>,
    /// Columns cross-tabulated against turnover
    pub crosstab_columns: Vec<String>,
    pub random_state: u64,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            elbow_max_k: 10,
            cluster_ks: vec![2, 3, 4, 5],
            cluster_features: vec![
                "satisfaction_level".to_string(),
                "last_evaluation".to_string(),
                TARGET_COLUMN.to_string(),
            ],
            crosstab_columns: vec![
                DEPARTMENT_COLUMN.to_string(),
                SALARY_COLUMN.to_string(),
                "number_project".to_string(),
            ],
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

/// Exploratory profile of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub n_rows: usize,
    pub n_columns: usize,
    pub missing: MissingValueReport,
    pub class_balance: ClassBalance,
    pub crosstabs: Vec<Crosstab>,
    pub numeric_summary: Vec<ColumnSummary>,
    pub elbow: Vec<ElbowPoint>,
    pub clusters: Vec<ClusterProfile>,
}

/// Count retained and departed rows
pub fn class_balance(df: &DataFrame) -> Result<ClassBalance> {
    let target = numeric_values(df, TARGET_COLUMN)?;
    let departed = target.iter().filter(|v| **v == 1.0).count();
    Ok(ClassBalance {
        retained: target.len() - departed,
        departed,
    })
}

/// Turnover by category. Salary follows its tier order, numeric columns
/// their numeric order, other text columns sort lexically.
pub fn turnover_crosstab(df: &DataFrame, column: &str) -> Result<Crosstab> {
    let target = numeric_values(df, TARGET_COLUMN)?;
    let series = df.column(column)?.as_materialized_series();

    let (categories, numeric_keys): (Vec<String>, Option<Vec<f64>>) =
        if matches!(series.dtype(), DataType::String) {
            let labels = series
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or("").to_string())
                .collect();
            (labels, None)
        } else {
            let values = numeric_values(df, column)?;
            (values.iter().map(|v| v.to_string()).collect(), Some(values))
        };

    let mut counts: HashMap<String, (usize, usize, f64)> = HashMap::new();
    for (i, (category, label)) in categories.iter().zip(target.iter()).enumerate() {
        let key = numeric_keys.as_ref().map_or(0.0, |k| k[i]);
        let entry = counts.entry(category.clone()).or_insert((0, 0, key));
        if *label == 1.0 {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    let mut rows: Vec<(f64, CrosstabRow)> = counts
        .into_iter()
        .map(|(category, (retained, departed, key))| {
            (
                key,
                CrosstabRow {
                    category,
                    retained,
                    departed,
                },
            )
        })
        .collect();

    rows.sort_by(|(ka, a), (kb, b)| {
        if numeric_keys.is_some() {
            ka.partial_cmp(kb).unwrap_or(Ordering::Equal)
        } else if column == SALARY_COLUMN {
            salary_code(&a.category).cmp(&salary_code(&b.category))
        } else {
            a.category.cmp(&b.category)
        }
    });

    Ok(Crosstab {
        column: column.to_string(),
        rows: rows.into_iter().map(|(_, row)| row).collect(),
    })
}

/// Summary statistics for every non-text column, in frame order
pub fn numeric_summary(df: &DataFrame) -> Result<Vec<ColumnSummary>> {
    df.get_columns()
        .iter()
        .filter(|c| !matches!(c.dtype(), DataType::String))
        .map(|c| {
            let name = c.name().to_string();
            let values = numeric_values(df, &name)?;
            let count = values.len();
            let mean = values.iter().sum::<f64>() / count.max(1) as f64;
            let var = if count > 1 {
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64
            } else {
                0.0
            };
            Ok(ColumnSummary {
                column: name,
                count,
                mean,
                std: var.sqrt(),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        })
        .collect()
}

/// Numeric matrix of the given columns
pub fn feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut x = Array2::zeros((n_rows, columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let values = numeric_values(df, name)?;
        for (i, v) in values.into_iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

/// Compute the full exploratory profile
pub fn profile_dataset(prepared: &PreparedDataset, options: &ProfileOptions) -> Result<DatasetProfile> {
    let df = &prepared.frame;
    if df.height() == 0 {
        return Err(KolosalError::DataError("dataset has no rows".to_string()));
    }

    let class_balance = class_balance(df)?;
    let crosstabs = options
        .crosstab_columns
        .iter()
        .map(|c| turnover_crosstab(df, c))
        .collect::<Result<Vec<_>>>()?;
    let numeric_summary = numeric_summary(df)?;

    let cluster_x = feature_matrix(df, &options.cluster_features)?;
    let elbow = elbow_curve(&cluster_x, options.elbow_max_k, options.random_state)?;
    let clusters = options
        .cluster_ks
        .iter()
        .filter(|&&k| k >= 1 && k <= cluster_x.nrows())
        .map(|&k| cluster_profile(&cluster_x, &options.cluster_features, k, options.random_state))
        .collect::<Result<Vec<_>>>()?;

    info!(
        rows = df.height(),
        departed = class_balance.departed,
        departure_rate = class_balance.departure_rate(),
        "dataset profiled"
    );

    Ok(DatasetProfile {
        n_rows: df.height(),
        n_columns: df.width(),
        missing: prepared.missing.clone(),
        class_balance,
        crosstabs,
        numeric_summary,
        elbow,
        clusters,
    })
}
