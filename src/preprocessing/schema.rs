//! Canonical column names and category consolidation for HR records

use crate::error::{KolosalError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Binary attrition label (1 = departed)
pub const TARGET_COLUMN: &str = "left";
pub const DEPARTMENT_COLUMN: &str = "department";
pub const SALARY_COLUMN: &str = "salary";

/// Columns that must be present once aliases are resolved
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "satisfaction_level",
    "last_evaluation",
    "number_project",
    "average_monthly_hours",
    "time_spend_company",
    "Work_accident",
    TARGET_COLUMN,
    "promotion_last_5years",
    DEPARTMENT_COLUMN,
    SALARY_COLUMN,
];

/// Legacy and misspelled headers mapped to their canonical names
pub const COLUMN_ALIASES: [(&str, &str); 3] = [
    ("sales", DEPARTMENT_COLUMN),
    ("dept", DEPARTMENT_COLUMN),
    ("average_montly_hours", "average_monthly_hours"),
];

/// Department labels folded into a single canonical label
pub const DEPARTMENT_MERGES: [(&str, &str); 2] = [("support", "technical"), ("IT", "technical")];

fn canonical_name(name: &str) -> &str {
    let trimmed = name.trim();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(trimmed)
}

/// Rename columns to canonical names and check the required set.
///
/// Fails with `SchemaError` when two headers resolve to the same name or a
/// required column is absent.
pub fn normalize_columns(mut df: DataFrame) -> Result<DataFrame> {
    let original: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut seen = HashSet::with_capacity(original.len());
    let mut renamed = Vec::with_capacity(original.len());
    for name in &original {
        let canonical = canonical_name(name).to_string();
        if !seen.insert(canonical.clone()) {
            return Err(KolosalError::SchemaError {
                column: canonical,
                detail: format!("appears more than once after renaming '{}'", name),
            });
        }
        if canonical != *name {
            debug!(from = %name, to = %canonical, "renamed column");
        }
        renamed.push(canonical);
    }

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !seen.contains(**c)) {
        return Err(KolosalError::SchemaError {
            column: missing.to_string(),
            detail: "is required but missing".to_string(),
        });
    }

    df.set_column_names(renamed.iter().map(|s| s.as_str()))?;
    Ok(df)
}

/// Keep only the required columns, in their canonical order.
///
/// Extra columns such as exported row ids never reach the encoder.
pub fn select_model_columns(df: DataFrame) -> Result<DataFrame> {
    let extra: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| !REQUIRED_COLUMNS.contains(&name.as_str()))
        .map(|name| name.to_string())
        .collect();
    if extra.is_empty() {
        return Ok(df);
    }
    debug!(columns = ?extra, "ignoring columns outside the HR schema");
    Ok(df.select(REQUIRED_COLUMNS)?)
}

/// Apply the fixed department lookup (`support`/`IT` -> `technical`)
pub fn consolidate_departments(mut df: DataFrame) -> Result<DataFrame> {
    let merged: StringChunked = {
        let departments = df
            .column(DEPARTMENT_COLUMN)?
            .as_materialized_series()
            .str()
            .map_err(|_| KolosalError::SchemaError {
                column: DEPARTMENT_COLUMN.to_string(),
                detail: "must hold text labels".to_string(),
            })?;

        departments
            .into_iter()
            .map(|value| {
                value.map(|v| {
                    DEPARTMENT_MERGES
                        .iter()
                        .find(|(from, _)| *from == v)
                        .map(|(_, to)| *to)
                        .unwrap_or(v)
                })
            })
            .collect()
    };

    df.with_column(merged.with_name(DEPARTMENT_COLUMN.into()).into_series())?;
    Ok(df)
}
