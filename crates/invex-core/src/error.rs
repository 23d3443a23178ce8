//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// Raw model output could not be processed at all.
    #[error("parsing error: {0}")]
    Parsing(#[from] ParsingError),

    /// Ground truth dataset is malformed.
    #[error("ground truth error: {0}")]
    GroundTruth(#[from] GroundTruthError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Document-level failures of the output parser.
///
/// A missing field is not a parsing error; it is recorded on the
/// extracted field instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// The model produced no text.
    #[error("model output is empty")]
    EmptyOutput,

    /// The output bytes are not valid UTF-8.
    #[error("model output is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// The output contains control bytes that indicate binary content.
    #[error("model output looks like binary data ({0} control bytes)")]
    Binary(usize),
}

/// Raw text could not be coerced into a field's canonical type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// Nothing left after trimming.
    #[error("{field}: value is empty")]
    Empty { field: String },

    /// No numeric substring found in an amount field.
    #[error("{field}: no number found in '{value}'")]
    NoNumber { field: String, value: String },

    /// Amount parsed but is zero or negative.
    #[error("{field}: amount must be positive, got {value}")]
    NonPositive { field: String, value: String },

    /// No supported date format matched.
    #[error("{field}: unrecognized date '{value}'")]
    UnparseableDate { field: String, value: String },
}

/// Errors raised while loading ground truth data.
#[derive(Error, Debug)]
pub enum GroundTruthError {
    /// A column required by the field specs is absent.
    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// The same invoice id appears more than once.
    #[error("duplicate invoice ids: {0:?}")]
    DuplicateIds(Vec<String>),

    /// One or more rows failed validation.
    #[error("field validation errors:\n{}", .0.join("\n"))]
    InvalidRows(Vec<String>),

    /// The requested invoice id is not part of the dataset.
    #[error("invoice {0} not found in ground truth data")]
    UnknownInvoice(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
