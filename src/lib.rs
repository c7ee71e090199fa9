//! # pg2parquet
//!
//! Stream PostgreSQL tables and query results into Apache Parquet files.
//!
//! Rows are pulled from a server-side cursor in fixed-size chunks, buffered
//! column-wise with their declared types, and written as Arrow record batches
//! through the Parquet writer. Memory use is bounded by the batch size, not by
//! the size of the table.
//!
//! ## Features
//!
//! - **Schema probing**: column types come from a `LIMIT 1` probe of the query
//! - **Bounded memory**: one batch of rows in memory at a time
//! - **Typed columns**: integers, floats, booleans, dates, times, timestamps and
//!   bytea keep their types; everything else is exported as text
//! - **Compression**: none, snappy, gzip, lz4 and zstd
//!
//! ## Table Export Example
//!
//! ```no_run
//! use pg2parquet::*;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), ExportError> {
//! let settings = PostgresSettings::new("localhost", 5432, "shop")
//!     .with_user("reader")
//!     .with_password("secret");
//! let mut source = PostgresSource::connect(&settings)?;
//!
//! let summary = export_table_to_parquet(
//!     &mut source,
//!     "orders",
//!     Path::new("/tmp/orders.parquet"),
//!     &ExportOptions::default(),
//! )?;
//! println!("Exported {} rows", summary.rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Query Export Example
//!
//! ```no_run
//! use pg2parquet::*;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), ExportError> {
//! let query = read_query_from_file("/queries/top_customers.sql")?;
//! let folder = validate_output_path("/tmp/out")?;
//!
//! let settings = PostgresSettings::new("localhost", 5432, "shop");
//! let mut source = PostgresSource::connect(&settings)?;
//! let options = ExportOptions::default()
//!     .with_batch_size(1_000)
//!     .with_compression(ParquetCompression::Zstd);
//!
//! export_query_to_parquet(&mut source, &query, &folder.join("top.parquet"), &options)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod export;
pub mod query;
pub mod source;
pub mod types;
pub mod validate;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{ExportOptions, PostgresSettings, DEFAULT_BATCH_SIZE, DEFAULT_OUTPUT_FILE};

// =============================================================================
// Error Types
// =============================================================================

/// Re-export error types for convenient error handling.
pub use error::{
    ConnectionError, ConversionError, ExportError, QueryError, ValidationError,
};

// =============================================================================
// Type System
// =============================================================================

pub use types::{ColumnDescriptor, PostgresType, Row, TypeMapper, Value};

// =============================================================================
// Sources
// =============================================================================

/// Database access used by the export pipeline.
pub use source::{
    resolve_schema, sorted_tables, validate_database_exists, validate_table_exists,
    PostgresSource, QuerySource, RowStream,
};

// =============================================================================
// Export
// =============================================================================

pub use buffer::ColumnBuffer;
pub use export::{
    export_query_to_parquet, export_table_to_parquet, export_tables_to_parquet,
    table_output_path, BatchFlusher, BatchWriter, ExportPipeline, ExportSummary,
    ParquetBatchWriter, ParquetCompression, PipelineState, TableExport,
};

// =============================================================================
// Validation
// =============================================================================

pub use query::{default_query, format_query_with_limit};
pub use validate::{read_query_from_file, validate_output_path, validate_query_path};
