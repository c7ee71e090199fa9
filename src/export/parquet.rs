//! Parquet output for the export pipeline.
//!
//! [`ParquetBatchWriter`] wraps an [`ArrowWriter`] bound to the schema resolved
//! by the probe query. It is opened once per export and receives batches as the
//! pipeline flushes them.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use arrow::datatypes::{DataType, Field, Schema};
//! use pg2parquet::export::{BatchWriter, ParquetBatchWriter, ParquetCompression};
//!
//! # fn example() -> Result<(), pg2parquet::ExportError> {
//! let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, true)]));
//! let writer = ParquetBatchWriter::create(
//!     Path::new("/tmp/users.parquet"),
//!     schema,
//!     ParquetCompression::Zstd,
//! )?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCompressionCodec, Encoding};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use super::flush::BatchWriter;
use crate::error::{ExportError, ValidationError};

/// Compression options for Parquet export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParquetCompression {
    /// No compression
    None,
    /// Snappy compression (fast, moderate ratio)
    #[default]
    Snappy,
    /// Gzip compression (slower, better ratio)
    Gzip,
    /// LZ4 compression (very fast, lower ratio)
    Lz4,
    /// Zstd compression (good balance of speed and ratio)
    Zstd,
}

impl ParquetCompression {
    /// Convert to parquet compression codec.
    fn to_codec(self) -> ParquetCompressionCodec {
        match self {
            ParquetCompression::None => ParquetCompressionCodec::UNCOMPRESSED,
            ParquetCompression::Snappy => ParquetCompressionCodec::SNAPPY,
            ParquetCompression::Gzip => ParquetCompressionCodec::GZIP(Default::default()),
            ParquetCompression::Lz4 => ParquetCompressionCodec::LZ4,
            ParquetCompression::Zstd => ParquetCompressionCodec::ZSTD(Default::default()),
        }
    }

    fn writer_properties(self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.to_codec())
            .set_encoding(Encoding::PLAIN)
            .build()
    }
}

impl FromStr for ParquetCompression {
    type Err = ValidationError;

    /// Parse a codec name, ignoring case. `uncompressed` is accepted for `none`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(ParquetCompression::None),
            "snappy" => Ok(ParquetCompression::Snappy),
            "gzip" => Ok(ParquetCompression::Gzip),
            "lz4" => Ok(ParquetCompression::Lz4),
            "zstd" => Ok(ParquetCompression::Zstd),
            _ => Err(ValidationError::InvalidCompression(s.to_string())),
        }
    }
}

impl fmt::Display for ParquetCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParquetCompression::None => "none",
            ParquetCompression::Snappy => "snappy",
            ParquetCompression::Gzip => "gzip",
            ParquetCompression::Lz4 => "lz4",
            ParquetCompression::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Schema-bound Parquet writer.
///
/// Dropping the writer without calling [`BatchWriter::close`] releases the
/// destination but leaves the file without a footer.
pub struct ParquetBatchWriter<W: Write + Send = File> {
    writer: ArrowWriter<W>,
    destination: Option<PathBuf>,
    rows: u64,
}

impl ParquetBatchWriter<File> {
    /// Create (or truncate) a Parquet file at `path`.
    ///
    /// If the file was created but the writer could not be set up, the error
    /// is [`ExportError::Interrupted`] since `path` no longer holds what it
    /// held before.
    pub fn create(
        path: &Path,
        schema: SchemaRef,
        compression: ParquetCompression,
    ) -> Result<Self, ExportError> {
        let file = File::create(path)?;
        let mut writer =
            Self::try_new(file, schema, compression).map_err(|e| ExportError::Interrupted {
                output: path.to_path_buf(),
                source: Box::new(e),
            })?;
        writer.destination = Some(path.to_path_buf());
        Ok(writer)
    }
}

impl<W: Write + Send> ParquetBatchWriter<W> {
    /// Create a Parquet writer over any `Write` destination.
    pub fn try_new(
        writer: W,
        schema: SchemaRef,
        compression: ParquetCompression,
    ) -> Result<Self, ExportError> {
        let props = compression.writer_properties();
        let writer = ArrowWriter::try_new(writer, schema, Some(props))?;
        Ok(Self {
            writer,
            destination: None,
            rows: 0,
        })
    }

    /// Rows accepted so far.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Write the footer and return the underlying destination.
    pub fn into_inner(self) -> Result<W, ExportError> {
        Ok(self.writer.into_inner()?)
    }
}

impl<W: Write + Send> BatchWriter for ParquetBatchWriter<W> {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), ExportError> {
        // Nothing to store; Parquet has no rows without columns.
        if batch.num_rows() == 0 || batch.num_columns() == 0 {
            return Ok(());
        }
        self.writer.write(batch)?;
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    fn close(self) -> Result<(), ExportError> {
        let metadata = self.writer.close()?;
        debug!(
            destination = ?self.destination,
            rows = metadata.num_rows,
            row_groups = metadata.row_groups.len(),
            "parquet writer closed"
        );
        Ok(())
    }
}
