//! CLI command implementations.
//!
//! Each command validates its inputs before connecting. When an export fails
//! after its output file was created, the incomplete file is removed.

use std::fs;
use std::path::Path;

use pg2parquet::{
    export_query_to_parquet, export_table_to_parquet, export_tables_to_parquet,
    read_query_from_file, validate_database_exists, validate_output_path,
    validate_table_exists, ExportError, ExportOptions, PostgresSettings, PostgresSource,
};
use tracing::{info, warn};

/// Export every table of the `public` schema into `folder`.
pub fn export_tables(
    settings: &PostgresSettings,
    folder: &Path,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    options.validate()?;
    let folder = validate_output_path(folder)?;
    validate_database_exists(settings)?;

    let mut source = PostgresSource::connect(settings)?;
    match export_tables_to_parquet(&mut source, &folder, options) {
        Ok(exports) => {
            for export in &exports {
                info!(
                    table = %export.table,
                    rows = export.summary.rows,
                    path = %export.path.display(),
                    "table exported"
                );
            }
            Ok(())
        }
        Err(err) => {
            remove_partial_output(&err);
            Err(err)
        }
    }
}

/// Export one table into `output`.
pub fn export_table(
    settings: &PostgresSettings,
    table: &str,
    output: &Path,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    options.validate()?;
    validate_output_dir(output)?;
    validate_database_exists(settings)?;

    let mut source = PostgresSource::connect(settings)?;
    validate_table_exists(&mut source, table)?;

    info!("Starting to dump table: {}", table);
    let summary = export_table_to_parquet(&mut source, table, output, options)
        .map_err(|err| {
            remove_partial_output(&err);
            err.for_target(table)
        })?;

    info!(rows = summary.rows, batches = summary.batches, "table exported");
    Ok(())
}

/// Export the result of the query in `query_file` into `output`.
pub fn export_query(
    settings: &PostgresSettings,
    query_file: &Path,
    output: &Path,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    options.validate()?;
    let query = read_query_from_file(query_file)?;
    validate_output_dir(output)?;
    validate_database_exists(settings)?;

    let mut source = PostgresSource::connect(settings)?;

    info!("Starting to dump query: {}", query_file.display());
    let summary = export_query_to_parquet(&mut source, &query, output, options).map_err(|err| {
        remove_partial_output(&err);
        err.for_target(query_file.display().to_string())
    })?;

    info!(rows = summary.rows, batches = summary.batches, "query exported");
    Ok(())
}

fn validate_output_dir(output: &Path) -> Result<(), ExportError> {
    let folder = output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    validate_output_path(folder)?;
    Ok(())
}

/// Delete the incomplete file a failed export left behind.
///
/// Only errors that carry an output path qualify. Failures before the writer
/// was opened never touched the file, so one from an earlier run is kept.
fn remove_partial_output(err: &ExportError) {
    let Some(path) = err.partial_output() else {
        return;
    };
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => info!("Removed partial output file: {}", path.display()),
        Err(e) => warn!("Failed to remove partial output file {}: {}", path.display(), e),
    }
}
