//! Dataset loading from a local CSV file or an http(s) URL

use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Where the dataset lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl DataSource {
    /// `http://` and `https://` locations are URLs, anything else a path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DataSource::Url(trimmed.to_string())
        } else {
            DataSource::Path(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => f.write_str(url),
        }
    }
}

/// CSV loader
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: Option<usize>,
    /// Timeout for remote sources
    timeout: Duration,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn options(&self) -> CsvReadOptions {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
    }

    /// Load from either kind of source
    pub fn load(&self, source: &DataSource) -> Result<DataFrame> {
        let start = Instant::now();
        let df = match source {
            DataSource::Path(path) => self.load_csv(path)?,
            DataSource::Url(url) => self.load_csv_bytes(self.fetch(url)?)?,
        };
        info!(
            source = %source,
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dataset loaded"
        );
        Ok(df)
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &std::path::Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            KolosalError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;
        skip_initial_space(self.options().into_reader_with_file_handle(file).finish()?)
    }

    /// Parse CSV content already in memory
    pub fn load_csv_bytes(&self, bytes: Vec<u8>) -> Result<DataFrame> {
        skip_initial_space(
            self.options()
                .into_reader_with_file_handle(Cursor::new(bytes))
                .finish()?,
        )
    }

    /// Download a remote CSV body
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| KolosalError::ConfigError(format!("invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(KolosalError::ConfigError(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| KolosalError::DataError(format!("HTTP client: {}", e)))?;

        let response = client
            .get(parsed)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| KolosalError::DataError(format!("download failed: {}", e)))?;

        let body = response
            .bytes()
            .map_err(|e| KolosalError::DataError(format!("download failed: {}", e)))?;
        Ok(body.to_vec())
    }
}

/// Drop the blanks that follow each delimiter, as in `a, b, c` exports.
///
/// Text columns are trimmed on the left and re-inferred as integer or float
/// when every present value parses; blank cells become null.
fn skip_initial_space(df: DataFrame) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| match column.dtype() {
            DataType::String => {
                let text = column.as_materialized_series().str()?;
                Ok(reinfer_text(text).into_column())
            }
            _ => Ok(column.clone()),
        })
        .collect::<Result<Vec<Column>>>()?;
    Ok(DataFrame::new(columns)?)
}

fn reinfer_text(values: &StringChunked) -> Series {
    let name = values.name().clone();
    let trimmed: Vec<Option<&str>> = values
        .into_iter()
        .map(|v| v.map(str::trim_start).filter(|v| !v.is_empty()))
        .collect();

    let ints: Option<Vec<Option<i64>>> = trimmed
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => s.trim_end().parse::<i64>().ok().map(Some),
        })
        .collect();
    if let Some(ints) = ints {
        return Series::new(name, ints);
    }

    let floats: Option<Vec<Option<f64>>> = trimmed
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => s.trim_end().parse::<f64>().ok().map(Some),
        })
        .collect();
    match floats {
        Some(floats) => Series::new(name, floats),
        None => Series::new(name, trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "satisfaction_level, left, salary").unwrap();
        writeln!(file, "0.38,1,low").unwrap();
        writeln!(file, "0.80,0,medium").unwrap();
        writeln!(file, "0.11,1,high").unwrap();
        file
    }

    #[test]
    fn test_source_parsing() {
        assert_eq!(
            DataSource::parse(" https://example.com/HR.csv "),
            DataSource::Url("https://example.com/HR.csv".to_string())
        );
        assert_eq!(
            DataSource::parse("data/HR.csv"),
            DataSource::Path(PathBuf::from("data/HR.csv"))
        );
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let source = DataSource::Path(file.path().to_path_buf());
        let df = DataLoader::new().load(&source).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_load_bytes() {
        let df = DataLoader::new()
            .load_csv_bytes(b"a,b\n1,2\n3,4\n".to_vec())
            .unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_space_after_delimiter() {
        let df = DataLoader::new()
            .load_csv_bytes(
                b"satisfaction_level, left, salary\n0.38, 1, low\n0.80, 0, medium\n".to_vec(),
            )
            .unwrap();

        assert_eq!(df.column(" left").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column(" salary").unwrap().dtype(), &DataType::String);
        let salary: Vec<Option<&str>> = df
            .column(" salary")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(salary, vec![Some("low"), Some("medium")]);
    }

    #[test]
    fn test_blank_text_cell_is_null() {
        let df = DataLoader::new()
            .load_csv_bytes(b"a,b\n1, 2.5\n2, \n".to_vec())
            .unwrap();
        let b = df.column("b").unwrap();
        assert_eq!(b.dtype(), &DataType::Float64);
        assert_eq!(b.null_count(), 1);
    }

    #[test]
    fn test_missing_file() {
        let source = DataSource::Path(PathBuf::from("/nonexistent/hr.csv"));
        assert!(matches!(
            DataLoader::new().load(&source),
            Err(KolosalError::DataError(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(DataLoader::new().fetch("ftp://example.com/hr.csv").is_err());
    }
}
