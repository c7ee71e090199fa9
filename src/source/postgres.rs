//! PostgreSQL source backed by the blocking `postgres` client.
//!
//! Rows are read through a server-side cursor (`DECLARE ... NO SCROLL CURSOR`
//! inside a transaction) and pulled with `FETCH n` over the extended query
//! protocol, so values arrive in their binary form and are decoded against the
//! probed schema. Columns whose type has no binary decoding are cast to `text`
//! by the cursor query. The full result set is never materialized.

use std::collections::VecDeque;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, SchemaRef};
use postgres::error::SqlState;
use postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, warn};

use super::decode::{decode_value, RawValue};
use super::{QuerySource, RowStream};
use crate::config::PostgresSettings;
use crate::error::{ConnectionError, ConversionError, ExportError, QueryError, ValidationError};
use crate::query::{quote_identifier, SELECT_TABLES_QUERY};
use crate::types::{ColumnDescriptor, Row, TypeMapper, Value};

const CURSOR_NAME: &str = "pg2parquet_cursor";

/// Alias of the subquery that wraps a cursor query needing text casts.
const CURSOR_SUBQUERY: &str = "pg2parquet_query";

/// Output formats of values that are cast to text.
const SESSION_SETUP: &str = "SET TIME ZONE 'UTC'; \
     SET DateStyle = 'ISO, YMD'; \
     SET IntervalStyle = 'iso_8601'; \
     SET extra_float_digits = 3; \
     SET bytea_output = 'hex'";

/// Connection to one PostgreSQL database.
pub struct PostgresSource {
    client: Client,
}

impl PostgresSource {
    /// Connect using `settings` and pin the session output formats.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ConnectionFailed`] if the server cannot be
    /// reached or rejects the credentials.
    pub fn connect(settings: &PostgresSettings) -> Result<Self, ExportError> {
        let config = settings.client_config()?;
        let target = settings.display_target();

        let mut client = config
            .connect(NoTls)
            .map_err(|e| connection_failed(&target, &e))?;
        client
            .batch_execute(SESSION_SETUP)
            .map_err(|e| connection_failed(&target, &e))?;

        debug!(target = %target, "connected to postgres");
        Ok(Self { client })
    }
}

impl QuerySource for PostgresSource {
    fn probe(&mut self, probe_query: &str) -> Result<Vec<ColumnDescriptor>, ExportError> {
        let statement = self
            .client
            .prepare(probe_query)
            .map_err(|e| probe_failed(probe_query, &e))?;
        self.client
            .query(&statement, &[])
            .map_err(|e| probe_failed(probe_query, &e))?;

        Ok(statement
            .columns()
            .iter()
            .map(|column| ColumnDescriptor::new(column.name(), column.type_().name()))
            .collect())
    }

    fn stream<'a>(
        &'a mut self,
        query: &str,
        schema: &SchemaRef,
        fetch_size: usize,
    ) -> Result<Box<dyn RowStream + 'a>, ExportError> {
        let stream = PostgresRowStream::open(&mut self.client, query, schema, fetch_size)?;
        Ok(Box::new(stream))
    }

    fn list_tables(&mut self) -> Result<Vec<String>, ExportError> {
        let messages = self
            .client
            .simple_query(SELECT_TABLES_QUERY)
            .map_err(|e| QueryError::CatalogFailed(describe(&e)))?;
        Ok(first_column(messages))
    }
}

/// Check that the configured database exists by connecting to it.
///
/// # Errors
///
/// SQLSTATE `3D000` maps to [`ValidationError::DatabaseDoesNotExist`]; any
/// other failure is a [`ConnectionError::ConnectionFailed`].
pub fn validate_database_exists(settings: &PostgresSettings) -> Result<(), ExportError> {
    let config = settings.client_config()?;
    match config.connect(NoTls) {
        Ok(_) => Ok(()),
        Err(e) if e.code() == Some(&SqlState::INVALID_CATALOG_NAME) => {
            Err(ValidationError::DatabaseDoesNotExist(settings.database.clone()).into())
        }
        Err(e) => Err(connection_failed(&settings.display_target(), &e)),
    }
}

/// Server-side cursor over one query.
///
/// The cursor lives in its own transaction. Exhausting the stream closes the
/// cursor and commits; dropping it early rolls the transaction back.
pub struct PostgresRowStream<'a> {
    client: &'a mut Client,
    names: Arc<[String]>,
    types: Vec<DataType>,
    fetch_query: String,
    fetch_size: usize,
    pending: VecDeque<postgres::Row>,
    exhausted: bool,
    in_transaction: bool,
}

impl<'a> PostgresRowStream<'a> {
    /// Begin a transaction and declare the cursor.
    pub fn open(
        client: &'a mut Client,
        query: &str,
        schema: &SchemaRef,
        fetch_size: usize,
    ) -> Result<Self, ExportError> {
        client
            .batch_execute("BEGIN")
            .map_err(|e| QueryError::CursorFailed(describe(&e)))?;

        let names: Arc<[String]> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let types = schema
            .fields()
            .iter()
            .map(|f| f.data_type().clone())
            .collect();

        // From here on, Drop rolls back on any early exit.
        let mut stream = Self {
            client,
            names,
            types,
            fetch_query: format!("FETCH {fetch_size} FROM {CURSOR_NAME}"),
            fetch_size,
            pending: VecDeque::with_capacity(fetch_size),
            exhausted: false,
            in_transaction: true,
        };

        let declare = format!(
            "DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {}",
            cursor_query(query, schema)
        );
        stream
            .client
            .batch_execute(&declare)
            .map_err(|e| QueryError::CursorFailed(describe(&e)))?;

        Ok(stream)
    }

    fn fetch(&mut self) -> Result<(), ExportError> {
        let rows = self
            .client
            .query(self.fetch_query.as_str(), &[])
            .map_err(|e| fetch_error(&e))?;

        let fetched = rows.len();
        self.pending.extend(rows);
        debug!(fetched, "fetched rows from cursor");

        if fetched < self.fetch_size {
            self.exhausted = true;
            self.finish()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.client
            .batch_execute(&format!("CLOSE {CURSOR_NAME}; COMMIT"))
            .map_err(|e| fetch_error(&e))?;
        self.in_transaction = false;
        Ok(())
    }

    fn decode(&self, row: &postgres::Row) -> Result<Row, ExportError> {
        let values = self
            .types
            .iter()
            .zip(self.names.iter())
            .enumerate()
            .map(|(idx, (data_type, name))| {
                // Out-of-range columns read as null.
                if idx >= row.len() {
                    return Ok(Value::Null);
                }
                let raw: RawValue<'_> = row.try_get(idx).map_err(|e| ConversionError::Decode {
                    column: name.clone(),
                    postgres_type: row.columns()[idx].type_().to_string(),
                    message: e.to_string(),
                })?;
                decode_value(&raw, data_type, name)
            })
            .collect::<Result<Vec<_>, ConversionError>>()?;
        Ok(Row::new(self.names.clone(), values))
    }
}

impl RowStream for PostgresRowStream<'_> {
    fn next_row(&mut self) -> Result<Option<Row>, ExportError> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return self.decode(&row).map(Some);
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch()?;
        }
    }
}

impl Drop for PostgresRowStream<'_> {
    fn drop(&mut self) {
        if !self.in_transaction || self.client.is_closed() {
            return;
        }
        if let Err(e) = self.client.batch_execute("ROLLBACK") {
            warn!("Failed to release cursor {}: {}", CURSOR_NAME, describe(&e));
        }
    }
}

/// The query the cursor runs.
///
/// When some column has no binary decoding, the query is wrapped in a
/// subquery with positional column aliases and those columns are cast to
/// `text`. Otherwise it runs unchanged.
fn cursor_query(query: &str, schema: &SchemaRef) -> String {
    let query = strip_terminator(query);
    let casts: Vec<bool> = schema.fields().iter().map(|f| needs_text_cast(f)).collect();
    if !casts.contains(&true) {
        return query.to_string();
    }

    let aliases: Vec<String> = (0..casts.len())
        .map(|idx| quote_identifier(&format!("c{idx}")))
        .collect();
    let columns = aliases
        .iter()
        .zip(&casts)
        .map(|(alias, &cast)| {
            if cast {
                format!("{alias}::text")
            } else {
                alias.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    // Newlines keep a trailing line comment in `query` from eating the alias.
    format!(
        "SELECT {columns} FROM (\n{query}\n) AS {CURSOR_SUBQUERY} ({})",
        aliases.join(", ")
    )
}

fn needs_text_cast(field: &Field) -> bool {
    TypeMapper::from_field_metadata(field.metadata())
        .is_some_and(|postgres_type| !postgres_type.has_binary_decoding())
}

fn strip_terminator(query: &str) -> &str {
    query.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn first_column(messages: Vec<SimpleQueryMessage>) -> Vec<String> {
    messages
        .into_iter()
        .filter_map(|message| match message {
            SimpleQueryMessage::Row(row) => row.try_get(0).ok().flatten().map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Server message when available, otherwise the client error text.
fn describe(err: &postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    }
}

fn connection_failed(target: &str, err: &postgres::Error) -> ExportError {
    ConnectionError::ConnectionFailed {
        target: target.to_string(),
        message: describe(err),
    }
    .into()
}

fn probe_failed(query: &str, err: &postgres::Error) -> ExportError {
    if err.is_closed() {
        return ConnectionError::ConnectionLost(describe(err)).into();
    }
    QueryError::ProbeFailed {
        query: query.to_string(),
        message: describe(err),
    }
    .into()
}

fn fetch_error(err: &postgres::Error) -> ExportError {
    if err.is_closed() {
        ConnectionError::ConnectionLost(describe(err)).into()
    } else {
        QueryError::FetchFailed(describe(err)).into()
    }
}
