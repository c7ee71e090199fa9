//! Scalar values and rows as delivered by a cursor.

use std::fmt;
use std::sync::Arc;

/// A single scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
    /// Days since the Unix epoch.
    Date32(i32),
    /// Microseconds since midnight.
    Time64(i64),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
}

impl Value {
    /// Whether this is the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "Boolean({v})"),
            Value::Int16(v) => write!(f, "Int16({v})"),
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::Int64(v) => write!(f, "Int64({v})"),
            Value::Float32(v) => write!(f, "Float32({v})"),
            Value::Float64(v) => write!(f, "Float64({v})"),
            Value::Utf8(v) => write!(f, "Utf8({v:?})"),
            Value::Binary(v) => write!(f, "Binary({} bytes)", v.len()),
            Value::Date32(v) => write!(f, "Date32({v})"),
            Value::Time64(v) => write!(f, "Time64({v})"),
            Value::Timestamp(v) => write!(f, "Timestamp({v})"),
        }
    }
}

/// One row from a cursor: shared column names plus one value per column.
///
/// Names are shared across all rows of a cursor so a row costs one `Vec`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. `values` is truncated or padded with nulls to the number
    /// of names.
    pub fn new(names: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(names.len(), Value::Null);
        Self { names, values }
    }

    /// Build a row from `(name, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self {
            names: names.into(),
            values,
        }
    }

    /// Column names of this row, in cursor order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Value at a position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value for a column name. First match wins on duplicate names.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
