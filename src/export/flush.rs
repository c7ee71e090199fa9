//! Conversion of buffered columns into Arrow record batches.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, StringBuilder, Time64MicrosecondArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, SchemaRef, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use tracing::{debug, info};

use crate::buffer::{BufferedColumn, ColumnBuffer, ColumnValues};
use crate::error::{ConversionError, ExportError};

/// Destination for record batches.
///
/// The export pipeline opens exactly one writer per export, after the schema
/// is known, and either closes it or drops it on failure.
pub trait BatchWriter {
    /// Append one batch. Zero-row batches must be accepted.
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), ExportError>;

    /// Finalize the output (footer, metadata) and release the destination.
    fn close(self) -> Result<(), ExportError>
    where
        Self: Sized;
}

/// Builds batches from a [`ColumnBuffer`] and hands them to a [`BatchWriter`].
///
/// Flushing never resets the buffer; the caller does that once the write has
/// succeeded.
#[derive(Debug, Default)]
pub struct BatchFlusher {
    batches_written: u64,
    rows_written: u64,
}

impl BatchFlusher {
    /// Create a flusher with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches handed to the writer so far.
    #[must_use]
    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    /// Number of rows handed to the writer so far.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Build a schema-conformant batch from the buffer contents.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::TypeMismatch` if a buffered column does not
    /// match its field in `schema`, or an Arrow error if the batch cannot be
    /// assembled.
    pub fn flush(buffer: &ColumnBuffer, schema: &SchemaRef) -> Result<RecordBatch, ExportError> {
        if buffer.columns().len() != schema.fields().len() {
            return Err(ExportError::Arrow(format!(
                "Buffer has {} columns but schema has {}",
                buffer.columns().len(),
                schema.fields().len()
            )));
        }

        let arrays = buffer
            .columns()
            .iter()
            .zip(schema.fields().iter())
            .map(|(column, field)| {
                let array = build_array(column, field.data_type())?;
                if array.data_type() != field.data_type() {
                    return Err(ConversionError::TypeMismatch {
                        column: field.name().clone(),
                        value: format!("{} array", array.data_type()),
                        expected: format!("{}", field.data_type()),
                    });
                }
                Ok(array)
            })
            .collect::<Result<Vec<ArrayRef>, ConversionError>>()?;

        // An explicit row count keeps zero-column schemas valid.
        let options = RecordBatchOptions::new().with_row_count(Some(buffer.len()));
        Ok(RecordBatch::try_new_with_options(
            schema.clone(),
            arrays,
            &options,
        )?)
    }

    /// Flush the buffer and append the resulting batch to `writer`.
    ///
    /// Returns the number of rows written.
    pub fn write<W: BatchWriter>(
        &mut self,
        buffer: &ColumnBuffer,
        writer: &mut W,
        destination: &str,
    ) -> Result<usize, ExportError> {
        let batch = Self::flush(buffer, buffer.schema())?;
        let rows = batch.num_rows();

        self.batches_written += 1;
        info!(
            "Writing batch {} to the file: {}",
            self.batches_written, destination
        );
        writer.write_batch(&batch)?;
        self.rows_written += rows as u64;
        debug!(rows, total = self.rows_written, "batch written");

        Ok(rows)
    }
}

/// Build one Arrow array from a buffered column.
fn build_array(column: &BufferedColumn, data_type: &DataType) -> Result<ArrayRef, ConversionError> {
    let array: ArrayRef = match (&column.values, data_type) {
        (ColumnValues::Boolean(v), DataType::Boolean) => {
            Arc::new(v.iter().collect::<BooleanArray>())
        }
        (ColumnValues::Int16(v), DataType::Int16) => Arc::new(v.iter().collect::<Int16Array>()),
        (ColumnValues::Int32(v), DataType::Int32) => Arc::new(v.iter().collect::<Int32Array>()),
        (ColumnValues::Int64(v), DataType::Int64) => Arc::new(v.iter().collect::<Int64Array>()),
        (ColumnValues::Float32(v), DataType::Float32) => {
            Arc::new(v.iter().collect::<Float32Array>())
        }
        (ColumnValues::Float64(v), DataType::Float64) => {
            Arc::new(v.iter().collect::<Float64Array>())
        }
        (ColumnValues::Utf8(v), DataType::Utf8) => {
            let mut builder = StringBuilder::with_capacity(v.len(), v.len() * 32);
            for value in v {
                match value {
                    Some(s) => builder.append_value(s),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        (ColumnValues::Binary(v), DataType::Binary) => {
            let mut builder = BinaryBuilder::with_capacity(v.len(), v.len() * 64);
            for value in v {
                match value {
                    Some(bytes) => builder.append_value(bytes),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        (ColumnValues::Date32(v), DataType::Date32) => Arc::new(v.iter().collect::<Date32Array>()),
        (ColumnValues::Time64(v), DataType::Time64(TimeUnit::Microsecond)) => {
            Arc::new(v.iter().collect::<Time64MicrosecondArray>())
        }
        (ColumnValues::Timestamp(v), DataType::Timestamp(TimeUnit::Microsecond, tz)) => Arc::new(
            v.iter()
                .collect::<TimestampMicrosecondArray>()
                .with_timezone_opt(tz.clone()),
        ),
        (values, expected) => {
            return Err(ConversionError::TypeMismatch {
                column: column.name.clone(),
                value: format!("{} buffered values", buffered_type_name(values)),
                expected: format!("{expected}"),
            })
        }
    };

    Ok(array)
}

fn buffered_type_name(values: &ColumnValues) -> &'static str {
    match values {
        ColumnValues::Boolean(_) => "Boolean",
        ColumnValues::Int16(_) => "Int16",
        ColumnValues::Int32(_) => "Int32",
        ColumnValues::Int64(_) => "Int64",
        ColumnValues::Float32(_) => "Float32",
        ColumnValues::Float64(_) => "Float64",
        ColumnValues::Utf8(_) => "Utf8",
        ColumnValues::Binary(_) => "Binary",
        ColumnValues::Date32(_) => "Date32",
        ColumnValues::Time64(_) => "Time64",
        ColumnValues::Timestamp(_) => "Timestamp",
    }
}
