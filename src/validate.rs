//! Up-front input validation.
//!
//! Everything here runs before a connection is opened, so a failure never
//! leaves an output file behind. Database and table checks need a live
//! connection and live in [`crate::source`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExportError, ValidationError};
use crate::query::validate_select;

/// Check that `output_path` exists and is not a file.
pub fn validate_output_path(output_path: impl AsRef<Path>) -> Result<PathBuf, ValidationError> {
    let output_path = output_path.as_ref();

    if !output_path.exists() {
        return Err(ValidationError::DirectoryDoesNotExist(output_path.to_path_buf()));
    }
    if output_path.is_file() {
        return Err(ValidationError::DirectoryIsAFile(output_path.to_path_buf()));
    }

    Ok(output_path.to_path_buf())
}

/// Check that `query_path` exists and is not a directory.
pub fn validate_query_path(query_path: impl AsRef<Path>) -> Result<PathBuf, ValidationError> {
    let query_path = query_path.as_ref();

    if !query_path.exists() {
        return Err(ValidationError::QueryFileDoesNotExist(query_path.to_path_buf()));
    }
    if query_path.is_dir() {
        return Err(ValidationError::QueryFileIsADirectory(query_path.to_path_buf()));
    }

    Ok(query_path.to_path_buf())
}

/// Read a query file, rejecting text without a `SELECT`.
///
/// # Errors
///
/// Path problems and a missing `SELECT` are [`ValidationError`]s; a file that
/// cannot be read is an I/O error.
pub fn read_query_from_file(query_path: impl AsRef<Path>) -> Result<String, ExportError> {
    let query_path = validate_query_path(query_path)?;
    let query = fs::read_to_string(&query_path)?;
    validate_select(&query)?;
    Ok(query)
}
