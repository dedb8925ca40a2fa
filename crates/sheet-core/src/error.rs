//! Error types for sheet-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sheet-core
#[derive(Debug, Error)]
pub enum Error {
    /// A dot-path segment is used both as a scalar and as a nested object
    #[error("structural conflict at '{path}': segment '{segment}' is both a value and an object")]
    StructuralConflict { path: String, segment: String },

    /// A record was written without an origin tag that routes to a row read earlier
    #[error("{}", describe_origin(.origin))]
    UnboundOriginTag { origin: Option<usize> },

    /// Two records in one write batch claim the same row
    #[error("origin tag {0} appears more than once in the record set")]
    DuplicateOriginTag(usize),

    /// A write targets a path that has no column in the header
    #[error("no header column is bound to path '{path}'")]
    HeaderMismatch { path: String },

    /// The header row changed between reading and writing a record set
    #[error("header row {row} changed since the records were read")]
    HeaderChanged { row: usize },

    /// A 1-based coordinate falls outside the region
    #[error("cell ({row}, {column}) is out of bounds")]
    OutOfBounds { row: usize, column: usize },

    /// Row layout of a tab does not make sense
    #[error("invalid tab config '{name}': {message}")]
    InvalidTabConfig { name: String, message: String },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_origin(origin: &Option<usize>) -> String {
    match origin {
        Some(origin) => format!("origin tag {origin} does not refer to a row that was read"),
        None => "record has no origin tag".to_string(),
    }
}

impl Error {
    pub(crate) fn conflict(path: &str, segment: &str) -> Self {
        Error::StructuralConflict {
            path: path.to_string(),
            segment: segment.to_string(),
        }
    }
}
