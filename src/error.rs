//! Error taxonomy for the booking pipeline.
//!
//! Every fallible library operation returns [`Result`], whose error side is
//! [`PipelineError`]. The variants fall into three groups:
//!
//! - **Configuration**: a schema that cannot be found or parsed, an unknown
//!   dataset key, an invalid setting.
//! - **I/O**: filesystem, HTTP, database, missing model artifacts.
//! - **Data shape**: a missing or clashing column, a value that does not fit
//!   its declared type, a null left in a required column.
//!
//! Nothing in the pipeline retries. Errors travel unchanged to the caller and
//! the binary turns them into a non-zero exit.
//!
//! ```
//! use hotelprep::error::PipelineError;
//!
//! let err = PipelineError::TypeCoercion {
//!     column: "adr".to_owned(),
//!     value: "abc".to_owned(),
//! };
//! assert_eq!(err.to_string(), "Cannot coerce value 'abc' in column 'adr'");
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The schema definition path does not resolve to a file
    #[error("Schema not found: {}", path.display())]
    SchemaNotFound { path: PathBuf },

    /// The schema definition is not a mapping of column name to a known type tag
    #[error("Invalid schema {}: {reason}", path.display())]
    SchemaParse { path: PathBuf, reason: String },

    /// A value could not be cast to the declared column type
    #[error("Cannot coerce value '{value}' in column '{column}'")]
    TypeCoercion { column: String, value: String },

    /// A step referenced a column that is not present
    #[error("Missing column '{column}'")]
    MissingColumn { column: String },

    /// A step tried to produce a column that already exists
    #[error("Column '{column}' already exists")]
    ColumnExists { column: String },

    /// A required column still holds nulls after imputation
    #[error("Required column '{column}' contains {nulls} null value(s)")]
    RequiredColumnNull { column: String, nulls: usize },

    /// The dataset key is not present in the registry
    #[error("Dataset '{0}' not found in configuration")]
    UnknownDataset(String),

    /// The remote answered with a non-success status
    #[error("Failed to download {url}: HTTP status {status}")]
    DownloadFailed { url: String, status: u16 },

    /// No model artifact exists at the resolved location
    #[error("Model artifact not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    /// Model training failed
    #[error("Training error: {0}")]
    Training(String),

    /// Invalid configuration or pipeline spec
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data processing error: {0}")]
    Data(#[from] polars::error::PolarsError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn coercion(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TypeCoercion {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::missing_column("lead_time");
        assert_eq!(err.to_string(), "Missing column 'lead_time'");

        let err = PipelineError::RequiredColumnNull {
            column: "hotel".to_owned(),
            nulls: 3,
        };
        assert_eq!(
            err.to_string(),
            "Required column 'hotel' contains 3 null value(s)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        fn read() -> Result<String> {
            let content = std::fs::read_to_string("/definitely/not/here.json")?;
            Ok(content)
        }

        assert!(matches!(read(), Err(PipelineError::Io(_))));
    }
}
