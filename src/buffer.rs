//! Column-oriented accumulation of cursor rows.
//!
//! [`ColumnBuffer`] keeps one typed, growable array per schema column, indexed
//! by position. Values are checked against the declared type when a row is
//! appended, so a bad value is reported with its column before anything is
//! flushed.

use arrow::datatypes::{DataType, SchemaRef, TimeUnit};

use crate::error::ConversionError;
use crate::types::{Row, Value};

/// Typed storage for a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Boolean(Vec<Option<bool>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    Binary(Vec<Option<Vec<u8>>>),
    Date32(Vec<Option<i32>>),
    Time64(Vec<Option<i64>>),
    Timestamp(Vec<Option<i64>>),
}

impl ColumnValues {
    /// Empty storage for an Arrow type.
    pub fn for_type(data_type: &DataType) -> Result<Self, ConversionError> {
        match data_type {
            DataType::Boolean => Ok(ColumnValues::Boolean(Vec::new())),
            DataType::Int16 => Ok(ColumnValues::Int16(Vec::new())),
            DataType::Int32 => Ok(ColumnValues::Int32(Vec::new())),
            DataType::Int64 => Ok(ColumnValues::Int64(Vec::new())),
            DataType::Float32 => Ok(ColumnValues::Float32(Vec::new())),
            DataType::Float64 => Ok(ColumnValues::Float64(Vec::new())),
            DataType::Utf8 => Ok(ColumnValues::Utf8(Vec::new())),
            DataType::Binary => Ok(ColumnValues::Binary(Vec::new())),
            DataType::Date32 => Ok(ColumnValues::Date32(Vec::new())),
            DataType::Time64(TimeUnit::Microsecond) => Ok(ColumnValues::Time64(Vec::new())),
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                Ok(ColumnValues::Timestamp(Vec::new()))
            }
            other => Err(ConversionError::UnsupportedType(format!("{other}"))),
        }
    }

    /// Number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Boolean(v) => v.len(),
            ColumnValues::Int16(v) => v.len(),
            ColumnValues::Int32(v) | ColumnValues::Date32(v) => v.len(),
            ColumnValues::Int64(v) | ColumnValues::Time64(v) | ColumnValues::Timestamp(v) => {
                v.len()
            }
            ColumnValues::Float32(v) => v.len(),
            ColumnValues::Float64(v) => v.len(),
            ColumnValues::Utf8(v) => v.len(),
            ColumnValues::Binary(v) => v.len(),
        }
    }

    /// Whether no values are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all values, keeping the allocation.
    fn clear(&mut self) {
        match self {
            ColumnValues::Boolean(v) => v.clear(),
            ColumnValues::Int16(v) => v.clear(),
            ColumnValues::Int32(v) | ColumnValues::Date32(v) => v.clear(),
            ColumnValues::Int64(v) | ColumnValues::Time64(v) | ColumnValues::Timestamp(v) => {
                v.clear()
            }
            ColumnValues::Float32(v) => v.clear(),
            ColumnValues::Float64(v) => v.clear(),
            ColumnValues::Utf8(v) => v.clear(),
            ColumnValues::Binary(v) => v.clear(),
        }
    }

    /// Whether `value` can be stored in this column without loss.
    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnValues::Boolean(_), Value::Boolean(_))
                | (ColumnValues::Int16(_), Value::Int16(_))
                | (ColumnValues::Int32(_), Value::Int16(_) | Value::Int32(_))
                | (
                    ColumnValues::Int64(_),
                    Value::Int16(_) | Value::Int32(_) | Value::Int64(_)
                )
                | (ColumnValues::Float32(_), Value::Float32(_))
                | (ColumnValues::Float64(_), Value::Float32(_) | Value::Float64(_))
                | (ColumnValues::Utf8(_), Value::Utf8(_))
                | (ColumnValues::Binary(_), Value::Binary(_))
                | (ColumnValues::Date32(_), Value::Date32(_))
                | (ColumnValues::Time64(_), Value::Time64(_))
                | (ColumnValues::Timestamp(_), Value::Timestamp(_))
        )
    }

    /// Push a value previously checked with [`accepts`](Self::accepts).
    fn push(&mut self, value: Value) {
        match (self, value) {
            (ColumnValues::Boolean(v), Value::Boolean(x)) => v.push(Some(x)),
            (ColumnValues::Int16(v), Value::Int16(x)) => v.push(Some(x)),
            (ColumnValues::Int32(v), Value::Int16(x)) => v.push(Some(i32::from(x))),
            (ColumnValues::Int32(v), Value::Int32(x)) => v.push(Some(x)),
            (ColumnValues::Int64(v), Value::Int16(x)) => v.push(Some(i64::from(x))),
            (ColumnValues::Int64(v), Value::Int32(x)) => v.push(Some(i64::from(x))),
            (ColumnValues::Int64(v), Value::Int64(x)) => v.push(Some(x)),
            (ColumnValues::Float32(v), Value::Float32(x)) => v.push(Some(x)),
            (ColumnValues::Float64(v), Value::Float32(x)) => v.push(Some(f64::from(x))),
            (ColumnValues::Float64(v), Value::Float64(x)) => v.push(Some(x)),
            (ColumnValues::Utf8(v), Value::Utf8(x)) => v.push(Some(x)),
            (ColumnValues::Binary(v), Value::Binary(x)) => v.push(Some(x)),
            (ColumnValues::Date32(v), Value::Date32(x)) => v.push(Some(x)),
            (ColumnValues::Time64(v), Value::Time64(x)) => v.push(Some(x)),
            (ColumnValues::Timestamp(v), Value::Timestamp(x)) => v.push(Some(x)),
            (column, _) => column.push_null(),
        }
    }

    fn push_null(&mut self) {
        match self {
            ColumnValues::Boolean(v) => v.push(None),
            ColumnValues::Int16(v) => v.push(None),
            ColumnValues::Int32(v) | ColumnValues::Date32(v) => v.push(None),
            ColumnValues::Int64(v) | ColumnValues::Time64(v) | ColumnValues::Timestamp(v) => {
                v.push(None)
            }
            ColumnValues::Float32(v) => v.push(None),
            ColumnValues::Float64(v) => v.push(None),
            ColumnValues::Utf8(v) => v.push(None),
            ColumnValues::Binary(v) => v.push(None),
        }
    }
}

/// One named column of the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedColumn {
    /// Column name from the schema.
    pub name: String,
    /// Declared Arrow type.
    pub data_type: DataType,
    /// Buffered values.
    pub values: ColumnValues,
}

/// Row-to-column accumulator bound to a fixed schema.
///
/// A row whose values do not fit the declared types is rejected as a whole,
/// so every column always holds the same number of values.
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    schema: SchemaRef,
    columns: Vec<BufferedColumn>,
    // Tracked separately so zero-column schemas still count rows.
    rows: usize,
    // Reused per row to stage values before committing them.
    staged: Vec<Value>,
}

impl ColumnBuffer {
    /// Create an empty buffer with one column per schema field.
    pub fn new(schema: SchemaRef) -> Result<Self, ConversionError> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                Ok(BufferedColumn {
                    name: field.name().clone(),
                    data_type: field.data_type().clone(),
                    values: ColumnValues::for_type(field.data_type())?,
                })
            })
            .collect::<Result<Vec<_>, ConversionError>>()?;

        let staged = Vec::with_capacity(columns.len());
        Ok(Self {
            schema,
            columns,
            rows: 0,
            staged,
        })
    }

    /// Schema the buffer is bound to.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Buffered columns in schema order.
    #[must_use]
    pub fn columns(&self) -> &[BufferedColumn] {
        &self.columns
    }

    /// Number of buffered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether no rows are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one row.
    ///
    /// Columns are matched by name. Row columns unknown to the schema are
    /// ignored; schema columns missing from the row are stored as null.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::TypeMismatch` naming the first offending
    /// column. The buffer is left unchanged in that case.
    pub fn append(&mut self, row: &Row) -> Result<(), ConversionError> {
        self.staged.clear();

        let aligned = row.names().len() >= self.columns.len()
            && self
                .columns
                .iter()
                .zip(row.names())
                .all(|(column, name)| &column.name == name);

        for (idx, column) in self.columns.iter().enumerate() {
            let value = if aligned {
                row.get(idx)
            } else {
                row.get_by_name(&column.name)
            };
            let value = value.cloned().unwrap_or(Value::Null);

            if !column.values.accepts(&value) {
                let err = ConversionError::TypeMismatch {
                    column: column.name.clone(),
                    value: value.to_string(),
                    expected: format!("{}", column.data_type),
                };
                self.staged.clear();
                return Err(err);
            }
            self.staged.push(value);
        }

        for (column, value) in self.columns.iter_mut().zip(self.staged.drain(..)) {
            column.values.push(value);
        }
        self.rows += 1;

        Ok(())
    }

    /// Empty every column in place, keeping the column set and allocations.
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.values.clear();
        }
        self.rows = 0;
    }
}
