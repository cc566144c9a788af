//! Numeric encoding of the prepared HR frame

use super::schema::{DEPARTMENT_COLUMN, SALARY_COLUMN, TARGET_COLUMN};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Salary tiers in ascending order; the position is the encoded value
pub const SALARY_ORDER: [&str; 3] = ["low", "medium", "high"];

/// Fully numeric features with the isolated target
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
}

impl EncodedDataset {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    /// Select rows by index, keeping feature names
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select(ndarray::Axis(0), indices),
            y: self.y.select(ndarray::Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Ordinal code of a salary label
pub fn salary_code(label: &str) -> Option<usize> {
    SALARY_ORDER.iter().position(|s| *s == label)
}

/// Encoding layout learned from a frame: which departments get an indicator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureEncoder {
    departments: Vec<String>,
    is_fitted: bool,
}

impl FeatureEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted department labels seen during fit
    pub fn departments(&self) -> &[String] {
        &self.departments
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let labels: BTreeSet<String> = string_column(df, DEPARTMENT_COLUMN)?
            .into_iter()
            .flatten()
            .map(|s| s.to_string())
            .collect();

        self.departments = labels.into_iter().collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode a frame: numeric columns in frame order with salary encoded in
    /// place, then one `department_<value>` indicator per fitted department.
    pub fn transform(&self, df: &DataFrame) -> Result<EncodedDataset> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut feature_names = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            match name {
                TARGET_COLUMN | DEPARTMENT_COLUMN => continue,
                SALARY_COLUMN => columns.push(encode_salary(df)?),
                _ => columns.push(numeric_values(df, name)?),
            }
            feature_names.push(name.to_string());
        }

        let departments = string_column(df, DEPARTMENT_COLUMN)?;
        for label in &self.departments {
            let indicator = departments
                .into_iter()
                .map(|v| if v == Some(label.as_str()) { 1.0 } else { 0.0 })
                .collect();
            columns.push(indicator);
            feature_names.push(format!("{}_{}", DEPARTMENT_COLUMN, label));
        }

        if let Some(unknown) = departments
            .into_iter()
            .flatten()
            .find(|v| !self.departments.iter().any(|d| d == v))
        {
            return Err(KolosalError::SchemaError {
                column: DEPARTMENT_COLUMN.to_string(),
                detail: format!("has category '{}' not seen during fit", unknown),
            });
        }

        let y = encode_target(df)?;

        let n_features = columns.len();
        let mut x = Array2::zeros((n_rows, n_features));
        for (j, values) in columns.iter().enumerate() {
            for (i, v) in values.iter().enumerate() {
                x[[i, j]] = *v;
            }
        }

        Ok(EncodedDataset { x, y, feature_names })
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<EncodedDataset> {
        self.fit(df)?;
        self.transform(df)
    }
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    df.column(name)?
        .as_materialized_series()
        .str()
        .map_err(|_| KolosalError::SchemaError {
            column: name.to_string(),
            detail: "must hold text labels".to_string(),
        })
}

/// Cast a column to f64, rejecting text and nulls
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let not_numeric = || KolosalError::SchemaError {
        column: name.to_string(),
        detail: "is not numeric".to_string(),
    };

    let series = df.column(name)?.as_materialized_series();
    if matches!(series.dtype(), DataType::String) {
        return Err(not_numeric());
    }
    let cast = series.strict_cast(&DataType::Float64).map_err(|_| not_numeric())?;
    let values = cast.f64().map_err(|_| not_numeric())?;

    values
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| KolosalError::DataQualityError {
                columns: vec![name.to_string()],
            })
        })
        .collect()
}

fn encode_salary(df: &DataFrame) -> Result<Vec<f64>> {
    string_column(df, SALARY_COLUMN)?
        .into_iter()
        .map(|value| {
            let label = value.ok_or_else(|| KolosalError::DataQualityError {
                columns: vec![SALARY_COLUMN.to_string()],
            })?;
            salary_code(label)
                .map(|code| code as f64)
                .ok_or_else(|| KolosalError::SchemaError {
                    column: SALARY_COLUMN.to_string(),
                    detail: format!("has unknown category '{}'", label),
                })
        })
        .collect()
}

fn encode_target(df: &DataFrame) -> Result<Array1<f64>> {
    let values = numeric_values(df, TARGET_COLUMN)?;
    if let Some(bad) = values.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(KolosalError::SchemaError {
            column: TARGET_COLUMN.to_string(),
            detail: format!("must be binary 0/1, found {}", bad),
        });
    }
    Ok(Array1::from(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "satisfaction_level" => &[0.1, 0.5, 0.9, 0.3],
            "salary" => &["high", "low", "medium", "low"],
            "left" => &[1i64, 0, 0, 1],
            "department" => &["sales", "technical", "hr", "sales"]
        )
        .unwrap()
    }

    #[test]
    fn test_salary_order() {
        assert!(salary_code("low") < salary_code("medium"));
        assert!(salary_code("medium") < salary_code("high"));
        assert_eq!(salary_code("executive"), None);
    }

    #[test]
    fn test_layout() {
        let encoded = FeatureEncoder::new().fit_transform(&frame()).unwrap();
        assert_eq!(
            encoded.feature_names,
            vec![
                "satisfaction_level",
                "salary",
                "department_hr",
                "department_sales",
                "department_technical"
            ]
        );
        assert_eq!(encoded.x.column(1).to_vec(), vec![2.0, 0.0, 1.0, 0.0]);
        assert_eq!(encoded.y.to_vec(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_one_hot_rows_sum_to_one() {
        let encoded = FeatureEncoder::new().fit_transform(&frame()).unwrap();
        for row in encoded.x.rows() {
            let total: f64 = row.iter().skip(2).sum();
            assert_eq!(total, 1.0);
        }
    }

    #[test]
    fn test_unknown_salary() {
        let mut df = frame();
        df.with_column(Series::new("salary".into(), &["high", "low", "vip", "low"]))
            .unwrap();
        let err = FeatureEncoder::new().fit_transform(&df).unwrap_err();
        assert!(matches!(err, KolosalError::SchemaError { ref column, .. } if column == "salary"));
    }

    #[test]
    fn test_non_binary_target() {
        let mut df = frame();
        df.with_column(Series::new("left".into(), &[2i64, 0, 0, 1]))
            .unwrap();
        assert!(FeatureEncoder::new().fit_transform(&df).is_err());
    }

    #[test]
    fn test_text_feature_rejected() {
        let mut df = frame();
        df.with_column(Series::new("notes".into(), &["a", "b", "c", "d"]))
            .unwrap();
        let err = FeatureEncoder::new().fit_transform(&df).unwrap_err();
        assert!(matches!(err, KolosalError::SchemaError { ref column, .. } if column == "notes"));
    }
}
