//! Row sources for the export pipeline.
//!
//! A [`QuerySource`] answers three questions: what columns a query returns
//! (the probe), which tables exist, and the rows of a query, pulled through a
//! [`RowStream`] in chunks. [`PostgresSource`] is the production
//! implementation; tests drive the pipeline through in-memory sources.

mod decode;
mod postgres;

pub use self::postgres::{validate_database_exists, PostgresRowStream, PostgresSource};

use arrow::datatypes::SchemaRef;
use tracing::debug;

use crate::error::{ExportError, ValidationError};
use crate::query::format_query_with_limit;
use crate::types::{ColumnDescriptor, Row, TypeMapper};

/// Incremental iterator over the rows of one query.
///
/// Dropping the stream releases the server-side cursor.
pub trait RowStream {
    /// Next row, or `None` once the result is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, ExportError>;
}

/// A database the exporter can read from.
pub trait QuerySource {
    /// Execute `probe_query` and report its result columns in order.
    fn probe(&mut self, probe_query: &str) -> Result<Vec<ColumnDescriptor>, ExportError>;

    /// Open a cursor over `query`, fetching `fetch_size` rows per round trip.
    ///
    /// Values are decoded to the types declared by `schema`.
    fn stream<'a>(
        &'a mut self,
        query: &str,
        schema: &SchemaRef,
        fetch_size: usize,
    ) -> Result<Box<dyn RowStream + 'a>, ExportError>;

    /// Names of the tables in the `public` schema.
    fn list_tables(&mut self) -> Result<Vec<String>, ExportError>;
}

/// Resolve the result schema of `query` with a `LIMIT 1` probe.
///
/// A probe with no columns yields an empty schema.
pub fn resolve_schema<S: QuerySource + ?Sized>(
    source: &mut S,
    query: &str,
) -> Result<SchemaRef, ExportError> {
    let probe_query = format_query_with_limit(query);
    debug!(probe = %probe_query, "resolving schema");
    let columns = source.probe(&probe_query)?;
    Ok(TypeMapper::schema_from_columns(&columns)?)
}

/// Tables of the `public` schema, sorted by name.
pub fn sorted_tables<S: QuerySource + ?Sized>(source: &mut S) -> Result<Vec<String>, ExportError> {
    let mut tables = source.list_tables()?;
    tables.sort();
    Ok(tables)
}

/// Check that `table` exists in the `public` schema.
pub fn validate_table_exists<S: QuerySource + ?Sized>(
    source: &mut S,
    table: &str,
) -> Result<(), ExportError> {
    if source.list_tables()?.iter().any(|t| t == table) {
        Ok(())
    } else {
        Err(ValidationError::TableDoesNotExist(table.to_string()).into())
    }
}
