use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while building the session feature matrix.
#[derive(Error, Debug)]
pub enum FeatureError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A CSV record could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A column the transform depends on is absent from the input table.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The column taxonomy is inconsistent.
    #[error("Invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    /// A value in a numerical column could not be coerced to a number.
    #[error("Non-numeric value {value:?} in column '{column}' at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    /// A session identifier is not integer-like.
    #[error("Invalid session id {value:?} at row {row}")]
    InvalidSessionId { row: usize, value: String },

    /// A row carries a different number of cells than the table has columns.
    #[error("Row {row} has {found} cells, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A composite `<session>_q<question>` label id could not be parsed.
    #[error("Invalid label id: {0}")]
    InvalidLabelId(String),

    /// No `.csv` / `.jsonl` input files were found under the given path.
    #[error("No input files found in {0}")]
    NoInputFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    /// Whether the error stems from configuration (schema, taxonomy, settings)
    /// rather than from the data itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FeatureError::MissingColumn(_) | FeatureError::InvalidTaxonomy(_) | FeatureError::Config(_)
        )
    }
}

/// Convenience alias used throughout the feature crates.
pub type Result<T> = std::result::Result<T, FeatureError>;
