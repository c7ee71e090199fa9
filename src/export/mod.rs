//! Streaming export from a query to a Parquet file.
//!
//! # Architecture
//!
//! An export runs in a single thread and holds at most one batch of rows in
//! memory:
//! 1. Probe the query with `LIMIT 1` to resolve the Arrow schema
//! 2. Open the Parquet writer against that schema
//! 3. Pull rows from a server-side cursor, `batch_size` rows per fetch
//! 4. Accumulate rows in a [`ColumnBuffer`](crate::buffer::ColumnBuffer) and
//!    flush them as record batches
//! 5. Flush the trailing rows and write the Parquet footer
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use pg2parquet::export::{export_table_to_parquet, ParquetCompression};
//! use pg2parquet::{ExportOptions, PostgresSettings, PostgresSource};
//!
//! # fn example() -> Result<(), pg2parquet::ExportError> {
//! let settings = PostgresSettings::new("localhost", 5432, "shop")
//!     .with_user("reader")
//!     .with_password("secret");
//! let mut source = PostgresSource::connect(&settings)?;
//!
//! let options = ExportOptions::default()
//!     .with_batch_size(5_000)
//!     .with_compression(ParquetCompression::Zstd);
//! let summary = export_table_to_parquet(
//!     &mut source,
//!     "orders",
//!     Path::new("/tmp/orders.parquet"),
//!     &options,
//! )?;
//!
//! println!("Exported {} rows in {} batches", summary.rows, summary.batches);
//! # Ok(())
//! # }
//! ```

pub mod flush;
pub mod parquet;
pub mod pipeline;

pub use flush::{BatchFlusher, BatchWriter};
pub use parquet::{ParquetBatchWriter, ParquetCompression};
pub use pipeline::{
    export_query_to_parquet, export_table_to_parquet, export_tables_to_parquet,
    table_output_path, ExportPipeline, ExportSummary, PipelineState, TableExport,
};
