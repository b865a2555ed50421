//! Error handling for the sky map target pipeline
//!
//! Library errors use thiserror so callers get typed variants with
//! proper error chains. Resolution failures are *not* errors here: they are
//! modelled as [`crate::resolver::ResolutionOutcome`] values because a failed
//! target never aborts the rest of a batch.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum SkyPlotError {
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Footprint error: {0}")]
    Footprint(#[from] FootprintError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures talking to a remote resolver (catalog backend or Sesame)
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("'{identifier}' not found")]
    NotFound { identifier: String },

    #[error("Transport failure for '{identifier}': {message}")]
    Transport { identifier: String, message: String },

    #[error("Unexpected response for '{identifier}': {message}")]
    MalformedResponse { identifier: String, message: String },
}

impl LookupError {
    /// True when the backend positively answered "no such object"
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }
}

/// Failures reading an uploaded target list
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Line {line}: expected 'ra,dec' or a single TIC id / name, found {fields} fields")]
    InvalidRow { line: usize, fields: usize },

    #[error("Line {line}: invalid coordinate '{value}'")]
    InvalidCoordinate { line: usize, value: String },

    #[error("Upload failed: {message}")]
    Upload { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures loading the CCD footprint dataset
#[derive(Error, Debug)]
pub enum FootprintError {
    #[error("Footprint dataset unavailable from {source_name}: {message}")]
    Unavailable { source_name: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures exporting tabular data
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Row index {index} out of range (table has {rows} rows)")]
    RowOutOfRange { index: usize, rows: usize },

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output was not valid UTF-8")]
    Encoding,
}

/// Invalid configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Result type alias for crate operations
pub type SkyPlotResult<T> = Result<T, SkyPlotError>;
