//! Error types for pg2parquet.
//!
//! Every failure is one variant of a closed enum. Validation, connectivity,
//! query and conversion failures each get their own type so callers can tell
//! "nothing was written" apart from "the export died half way".

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Configuration and input validation failures.
///
/// These are always detected before any row is streamed, so no output file
/// exists when one of them is returned.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Output directory is missing.
    #[error("Output directory '{0}' does not exist.")]
    DirectoryDoesNotExist(PathBuf),

    /// Output directory path points at a regular file.
    #[error("Output directory '{0}' is actually a file.")]
    DirectoryIsAFile(PathBuf),

    /// Query file is missing.
    #[error("Query file '{0}' does not exist.")]
    QueryFileDoesNotExist(PathBuf),

    /// Query file path points at a directory.
    #[error("Query file '{0}' is actually a directory.")]
    QueryFileIsADirectory(PathBuf),

    /// Query text is not a SELECT.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Target database does not exist on the server.
    #[error("Database does not exist: {0}")]
    DatabaseDoesNotExist(String),

    /// Target table is not present in the public schema.
    #[error("Table '{0}' does not exist in database.")]
    TableDoesNotExist(String),

    /// A user was configured without a password.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Batch size must be positive.
    #[error("Batch size must be greater than zero, got {0}")]
    InvalidBatchSize(usize),

    /// Unknown Parquet compression codec name.
    #[error("Unknown compression '{0}', expected one of: none, snappy, gzip, lz4, zstd")]
    InvalidCompression(String),
}

/// Failures to reach or stay connected to the database.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Connection could not be established (unreachable host, auth failure).
    #[error("Failed to connect to {target}: {message}")]
    ConnectionFailed { target: String, message: String },

    /// Connection dropped while a cursor was open.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Failures reported by the database engine for a statement.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The `LIMIT 1` probe was rejected.
    #[error("Schema probe failed for query '{query}': {message}")]
    ProbeFailed { query: String, message: String },

    /// The server-side cursor could not be declared.
    #[error("Failed to open cursor: {0}")]
    CursorFailed(String),

    /// A FETCH from the open cursor failed.
    #[error("Failed to fetch rows: {0}")]
    FetchFailed(String),

    /// Catalog listing (tables) failed.
    #[error("Catalog query failed: {0}")]
    CatalogFailed(String),
}

/// Failures converting database values into typed columns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// A value's runtime type is not coercible to the declared column type.
    #[error("Type mismatch in column '{column}': expected {expected}, got {value}")]
    TypeMismatch {
        column: String,
        value: String,
        expected: String,
    },

    /// A wire value could not be decoded as its server type.
    #[error("Cannot decode {postgres_type} value in column '{column}': {message}")]
    Decode {
        column: String,
        postgres_type: String,
        message: String,
    },

    /// Type has no columnar representation.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
}

/// Top-level error returned by export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Input validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Connectivity error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Query error
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Value conversion error
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(String),

    /// Failure after the output file was created. The file is incomplete.
    #[error("{source} (incomplete output at '{}')", .output.display())]
    Interrupted {
        output: PathBuf,
        #[source]
        source: Box<ExportError>,
    },

    /// Failure of one table or query inside a larger run.
    #[error("Export of '{target}' failed: {source}")]
    Target {
        target: String,
        #[source]
        source: Box<ExportError>,
    },
}

impl ExportError {
    /// Attach the table or query identity to an error.
    #[must_use]
    pub fn for_target(self, target: impl Into<String>) -> Self {
        match self {
            // Keep the innermost identity.
            ExportError::Target { .. } => self,
            other => ExportError::Target {
                target: target.into(),
                source: Box::new(other),
            },
        }
    }

    /// The incomplete output file this failure left behind, if any.
    #[must_use]
    pub fn partial_output(&self) -> Option<&Path> {
        match self {
            ExportError::Interrupted { output, .. } => Some(output),
            ExportError::Target { source, .. } => source.partial_output(),
            _ => None,
        }
    }

    /// Whether the failure happened before any output file was created.
    #[must_use]
    pub fn is_fatal_before_output(&self) -> bool {
        self.partial_output().is_none()
    }
}

impl From<arrow::error::ArrowError> for ExportError {
    fn from(err: arrow::error::ArrowError) -> Self {
        ExportError::Arrow(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for ExportError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        ExportError::Parquet(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::DirectoryDoesNotExist(PathBuf::from("/nope"));
        assert_eq!(err.to_string(), "Output directory '/nope' does not exist.");

        let err = ValidationError::TableDoesNotExist("users".to_string());
        assert_eq!(err.to_string(), "Table 'users' does not exist in database.");
    }

    #[test]
    fn test_type_mismatch_names_column_and_value() {
        let err = ConversionError::TypeMismatch {
            column: "id".to_string(),
            value: "Utf8(\"x\")".to_string(),
            expected: "Int32".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'id'"));
        assert!(msg.contains("Utf8"));
        assert!(msg.contains("Int32"));
    }

    #[test]
    fn test_for_target_wraps_once() {
        let err = ExportError::from(QueryError::FetchFailed("boom".to_string()))
            .for_target("orders")
            .for_target("ignored");

        match &err {
            ExportError::Target { target, source } => {
                assert_eq!(target, "orders");
                assert!(matches!(**source, ExportError::Query(QueryError::FetchFailed(_))));
            }
            other => panic!("expected Target, got {other:?}"),
        }
        assert!(err.to_string().contains("'orders'"));
    }

    #[test]
    fn test_is_fatal_before_output() {
        let before = ExportError::from(ValidationError::InvalidQuery("x".to_string()));
        assert!(before.is_fatal_before_output());
        assert!(before.for_target("q").is_fatal_before_output());

        // A dropped connection alone says nothing about the output file.
        let lost = ExportError::from(ConnectionError::ConnectionLost("eof".to_string()));
        assert!(lost.partial_output().is_none());
        assert!(lost.is_fatal_before_output());
    }

    #[test]
    fn test_partial_output_through_target() {
        let mid = ExportError::Interrupted {
            output: PathBuf::from("/data/t.parquet"),
            source: Box::new(
                ConversionError::TypeMismatch {
                    column: "a".to_string(),
                    value: "b".to_string(),
                    expected: "c".to_string(),
                }
                .into(),
            ),
        };
        assert_eq!(mid.partial_output(), Some(Path::new("/data/t.parquet")));
        assert!(mid.to_string().contains("Type mismatch in column 'a'"));
        assert!(mid.to_string().contains("/data/t.parquet"));

        let wrapped = mid.for_target("t");
        assert!(!wrapped.is_fatal_before_output());
        assert_eq!(wrapped.partial_output(), Some(Path::new("/data/t.parquet")));
    }
}
