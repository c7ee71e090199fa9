//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::env;
use std::fs::File;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pg2parquet::{
    ColumnDescriptor, ConnectionError, ExportError, PostgresSettings, QueryError, QuerySource,
    Row, RowStream, Value,
};

/// In-memory stand-in for a database.
#[derive(Default)]
pub struct MemorySource {
    pub tables: Vec<MemoryTable>,
    /// Every probe query received, in order.
    pub probes: Vec<String>,
    /// Every streamed query received, in order.
    pub streams: Vec<String>,
    /// Fail every schema lookup as if the server went away.
    pub lose_connection_on_schema_lookup: bool,
}

pub struct MemoryTable {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
}

impl MemoryTable {
    /// `(id int4, name text)` table.
    pub fn id_name(name: &str, rows: &[(i32, &str)]) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![
                ColumnDescriptor::new("id", "int4"),
                ColumnDescriptor::new("name", "text"),
            ],
            rows: rows
                .iter()
                .map(|(id, value)| {
                    Row::from_pairs([
                        ("id", Value::Int32(*id)),
                        ("name", Value::Utf8((*value).to_string())),
                    ])
                })
                .collect(),
        }
    }

    /// `(id int4, name text)` table with ids `0..count`.
    pub fn sequential(name: &str, count: i32) -> Self {
        let rows: Vec<(i32, String)> = (0..count).map(|i| (i, format!("row-{i}"))).collect();
        let borrowed: Vec<(i32, &str)> = rows.iter().map(|(i, s)| (*i, s.as_str())).collect();
        Self::id_name(name, &borrowed)
    }
}

impl MemorySource {
    pub fn with_tables(tables: Vec<MemoryTable>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    /// Find the table a query refers to by its quoted or bare name.
    fn table_for(&self, query: &str) -> Option<&MemoryTable> {
        self.tables.iter().find(|t| {
            query.contains(&format!("\"{}\"", t.name)) || query.contains(&format!(" {} ", t.name))
        })
    }
}

struct VecStream {
    rows: VecDeque<Row>,
}

impl RowStream for VecStream {
    fn next_row(&mut self) -> Result<Option<Row>, ExportError> {
        Ok(self.rows.pop_front())
    }
}

impl QuerySource for MemorySource {
    fn probe(&mut self, probe_query: &str) -> Result<Vec<ColumnDescriptor>, ExportError> {
        self.probes.push(probe_query.to_string());
        if self.lose_connection_on_schema_lookup {
            return Err(ConnectionError::ConnectionLost("server closed the connection".to_string())
                .into());
        }
        match self.table_for(probe_query) {
            Some(table) => Ok(table.columns.clone()),
            None => Err(QueryError::ProbeFailed {
                query: probe_query.to_string(),
                message: "relation does not exist".to_string(),
            }
            .into()),
        }
    }

    fn stream<'a>(
        &'a mut self,
        query: &str,
        _schema: &SchemaRef,
        _fetch_size: usize,
    ) -> Result<Box<dyn RowStream + 'a>, ExportError> {
        self.streams.push(query.to_string());
        let table = self
            .table_for(query)
            .ok_or_else(|| QueryError::CursorFailed("relation does not exist".to_string()))?;
        Ok(Box::new(VecStream {
            rows: table.rows.iter().cloned().collect(),
        }))
    }

    fn list_tables(&mut self) -> Result<Vec<String>, ExportError> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }
}

/// Read a Parquet file back into record batches.
pub fn read_parquet(path: &Path) -> (SchemaRef, Vec<RecordBatch>) {
    let file = File::open(path).expect("parquet file should exist");
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).expect("valid parquet file");
    let schema = builder.schema().clone();
    let batches = builder
        .build()
        .expect("reader should build")
        .collect::<Result<Vec<_>, _>>()
        .expect("batches should decode");
    (schema, batches)
}

/// PostgreSQL settings for live tests, from `PG2PARQUET_TEST_*` variables.
pub fn test_settings() -> PostgresSettings {
    let host = env::var("PG2PARQUET_TEST_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("PG2PARQUET_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5432);
    let database = env::var("PG2PARQUET_TEST_DATABASE").unwrap_or_else(|_| "postgres".to_string());
    let user = env::var("PG2PARQUET_TEST_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("PG2PARQUET_TEST_PASSWORD").unwrap_or_else(|_| "postgres".to_string());

    PostgresSettings::new(host, port, database)
        .with_user(user)
        .with_password(password)
}
