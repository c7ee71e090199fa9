//! The streaming export loop.
//!
//! [`ExportPipeline`] drives one export from query text to a finished file:
//!
//! 1. Probe the query (`LIMIT 1`) and build the schema
//! 2. Open the writer against that schema
//! 3. Open a server-side cursor that fetches `batch_size` rows per round trip
//! 4. Buffer rows column-wise, flushing whenever the row index is a multiple
//!    of `batch_size`
//! 5. Flush whatever remains once the cursor is exhausted, then close the writer
//!
//! The flush check runs before a row is appended, so row 0 always flushes an
//! empty buffer and the final rows always leave through the trailing flush.
//! Zero-row batches are expected and must be accepted by the writer.

use std::fmt;
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use tracing::{debug, info};

use super::flush::{BatchFlusher, BatchWriter};
use super::parquet::ParquetBatchWriter;
use crate::buffer::ColumnBuffer;
use crate::config::ExportOptions;
use crate::error::ExportError;
use crate::query::default_query;
use crate::source::{resolve_schema, sorted_tables, QuerySource};

/// Lifecycle of a single export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SchemaResolved,
    WriterOpen,
    Streaming,
    Draining,
    Closed,
    Errored,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::SchemaResolved => "schema-resolved",
            PipelineState::WriterOpen => "writer-open",
            PipelineState::Streaming => "streaming",
            PipelineState::Draining => "draining",
            PipelineState::Closed => "closed",
            PipelineState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Outcome of a finished export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Rows written to the output.
    pub rows: u64,
    /// Batches handed to the writer, empty ones included.
    pub batches: u64,
    /// Schema the output was written with.
    pub schema: SchemaRef,
}

/// One query, one output, one pass over a server-side cursor.
pub struct ExportPipeline<'s, S: QuerySource + ?Sized> {
    source: &'s mut S,
    options: ExportOptions,
    state: PipelineState,
    output_opened: bool,
}

impl<'s, S: QuerySource + ?Sized> ExportPipeline<'s, S> {
    pub fn new(source: &'s mut S, options: ExportOptions) -> Self {
        Self {
            source,
            options,
            state: PipelineState::Idle,
            output_opened: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Whether the last run got as far as opening its writer.
    ///
    /// After a failed run this tells whether the output may be incomplete.
    #[must_use]
    pub fn output_opened(&self) -> bool {
        self.output_opened
    }

    /// Export the rows of `query` into the writer returned by `open_writer`.
    ///
    /// `open_writer` is called once, after the schema is resolved; if the
    /// probe fails it is never called. `destination` is only used in log
    /// messages.
    ///
    /// On failure the pipeline ends in [`PipelineState::Errored`]. The cursor
    /// and writer are dropped, and whatever the writer produced so far is
    /// left to the caller.
    pub fn run<W, F>(
        &mut self,
        query: &str,
        destination: &str,
        open_writer: F,
    ) -> Result<ExportSummary, ExportError>
    where
        W: BatchWriter,
        F: FnOnce(SchemaRef) -> Result<W, ExportError>,
    {
        self.state = PipelineState::Idle;
        self.output_opened = false;
        let result = self.execute(query, destination, open_writer);
        if result.is_err() {
            transition(&mut self.state, PipelineState::Errored);
        }
        result
    }

    fn execute<W, F>(
        &mut self,
        query: &str,
        destination: &str,
        open_writer: F,
    ) -> Result<ExportSummary, ExportError>
    where
        W: BatchWriter,
        F: FnOnce(SchemaRef) -> Result<W, ExportError>,
    {
        self.options.validate()?;
        let batch_size = self.options.batch_size;

        let schema = resolve_schema(&mut *self.source, query)?;
        transition(&mut self.state, PipelineState::SchemaResolved);

        let mut writer = open_writer(schema.clone())?;
        self.output_opened = true;
        transition(&mut self.state, PipelineState::WriterOpen);

        let mut buffer = ColumnBuffer::new(schema.clone())?;
        let mut flusher = BatchFlusher::new();

        info!("Connected to DB, starting to execute query...");
        let mut rows = self.source.stream(query, &schema, batch_size)?;
        transition(&mut self.state, PipelineState::Streaming);
        info!("Query executed...");

        let mut row_index: usize = 0;
        while let Some(row) = rows.next_row()? {
            if row_index % batch_size == 0 {
                flusher.write(&buffer, &mut writer, destination)?;
                buffer.reset();
            }
            buffer.append(&row)?;
            row_index += 1;
        }
        // Release the cursor before finishing the file.
        drop(rows);
        transition(&mut self.state, PipelineState::Draining);

        flusher.write(&buffer, &mut writer, destination)?;
        buffer.reset();
        writer.close()?;
        transition(&mut self.state, PipelineState::Closed);

        info!("Export finished successfully.");
        Ok(ExportSummary {
            rows: flusher.rows_written(),
            batches: flusher.batches_written(),
            schema,
        })
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = %state, to = %next, "pipeline state");
    *state = next;
}

/// Export the rows of `query` into a Parquet file at `output`.
///
/// A failure after the file was created is returned as
/// [`ExportError::Interrupted`] carrying `output`, so the caller can decide
/// what to do with the incomplete file. Earlier failures leave `output`
/// untouched.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use pg2parquet::{export_query_to_parquet, ExportOptions, PostgresSettings, PostgresSource};
///
/// # fn example() -> Result<(), pg2parquet::ExportError> {
/// let settings = PostgresSettings::new("localhost", 5432, "shop");
/// let mut source = PostgresSource::connect(&settings)?;
/// let summary = export_query_to_parquet(
///     &mut source,
///     "SELECT id, total FROM orders WHERE total > 100",
///     Path::new("/tmp/orders.parquet"),
///     &ExportOptions::default(),
/// )?;
/// println!("wrote {} rows", summary.rows);
/// # Ok(())
/// # }
/// ```
pub fn export_query_to_parquet<S: QuerySource + ?Sized>(
    source: &mut S,
    query: &str,
    output: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let destination = output.display().to_string();
    let compression = options.compression;
    let mut pipeline = ExportPipeline::new(source, *options);
    let result = pipeline.run(query, &destination, |schema| {
        ParquetBatchWriter::create(output, schema, compression)
    });
    match result {
        Err(err) if pipeline.output_opened() => Err(ExportError::Interrupted {
            output: output.to_path_buf(),
            source: Box::new(err),
        }),
        other => other,
    }
}

/// Export every row of `table` into a Parquet file at `output`.
pub fn export_table_to_parquet<S: QuerySource + ?Sized>(
    source: &mut S,
    table: &str,
    output: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    export_query_to_parquet(source, &default_query(table), output, options)
}

/// Result of exporting one table in a multi-table run.
#[derive(Debug, Clone)]
pub struct TableExport {
    pub table: String,
    pub path: PathBuf,
    pub summary: ExportSummary,
}

/// Path of a table's file inside `folder`.
#[must_use]
pub fn table_output_path(folder: &Path, table: &str) -> PathBuf {
    folder.join(format!("{table}.parquet"))
}

/// Export every table of the `public` schema to `folder/<table>.parquet`.
///
/// Tables run one after another in name order. The first failure stops the
/// run and is returned as [`ExportError::Target`] naming the table.
pub fn export_tables_to_parquet<S: QuerySource + ?Sized>(
    source: &mut S,
    folder: &Path,
    options: &ExportOptions,
) -> Result<Vec<TableExport>, ExportError> {
    let tables = sorted_tables(source)?;
    info!("Found tables to dump: {:?}", tables);

    let mut exported = Vec::with_capacity(tables.len());
    for table in tables {
        info!("Starting to dump table: {}", table);
        let path = table_output_path(folder, &table);
        let summary = export_table_to_parquet(source, &table, &path, options)
            .map_err(|e| e.for_target(table.as_str()))?;
        exported.push(TableExport {
            table,
            path,
            summary,
        });
    }
    Ok(exported)
}
