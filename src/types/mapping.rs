//! Type mapping between PostgreSQL and Apache Arrow data types.

use crate::error::ConversionError;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field metadata key holding the original PostgreSQL type name.
pub const POSTGRES_TYPE_METADATA_KEY: &str = "postgres:type";

/// PostgreSQL data type representation.
///
/// Only the types with a dedicated columnar encoding get their own variant;
/// everything else is exported through its text representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostgresType {
    /// bool
    Boolean,
    /// int2 / smallint
    SmallInt,
    /// int4 / integer
    Integer,
    /// int8 / bigint
    BigInt,
    /// oid
    Oid,
    /// float4 / real
    Real,
    /// float8 / double precision
    DoublePrecision,
    /// date
    Date,
    /// time without time zone
    Time,
    /// timestamp without time zone
    Timestamp,
    /// timestamp with time zone
    TimestampTz,
    /// bytea
    Bytea,
    /// text, varchar, bpchar, name
    Text,
    /// Any other type (numeric, uuid, json, arrays, "char", ...), kept by name.
    Other(String),
}

impl PostgresType {
    /// Parse a PostgreSQL type name as reported by the server
    /// (`pg_type.typname`) or by `information_schema` (SQL standard names).
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => PostgresType::Boolean,
            "int2" | "smallint" | "smallserial" => PostgresType::SmallInt,
            "int4" | "integer" | "int" | "serial" => PostgresType::Integer,
            "int8" | "bigint" | "bigserial" => PostgresType::BigInt,
            "oid" => PostgresType::Oid,
            "float4" | "real" => PostgresType::Real,
            "float8" | "double precision" => PostgresType::DoublePrecision,
            "date" => PostgresType::Date,
            "time" | "time without time zone" => PostgresType::Time,
            "timestamp" | "timestamp without time zone" => PostgresType::Timestamp,
            "timestamptz" | "timestamp with time zone" => PostgresType::TimestampTz,
            "bytea" => PostgresType::Bytea,
            "text" | "varchar" | "character varying" | "bpchar" | "character" | "name" => {
                PostgresType::Text
            }
            other => PostgresType::Other(other.to_string()),
        }
    }

    /// Canonical `pg_type` name for this type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            PostgresType::Boolean => "bool",
            PostgresType::SmallInt => "int2",
            PostgresType::Integer => "int4",
            PostgresType::BigInt => "int8",
            PostgresType::Oid => "oid",
            PostgresType::Real => "float4",
            PostgresType::DoublePrecision => "float8",
            PostgresType::Date => "date",
            PostgresType::Time => "time",
            PostgresType::Timestamp => "timestamp",
            PostgresType::TimestampTz => "timestamptz",
            PostgresType::Bytea => "bytea",
            PostgresType::Text => "text",
            PostgresType::Other(name) => name,
        }
    }

    /// Whether values of this type are read in their binary wire format.
    /// Everything else is cast to `text` by the server before it is fetched.
    #[must_use]
    pub fn has_binary_decoding(&self) -> bool {
        !matches!(self, PostgresType::Other(_))
    }
}

impl fmt::Display for PostgresType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A column as reported by the schema probe: name plus server type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name as returned by the query.
    pub name: String,
    /// Server-side type.
    pub postgres_type: PostgresType,
}

impl ColumnDescriptor {
    /// Build a descriptor from a column name and a server type name.
    pub fn new(name: impl Into<String>, type_name: &str) -> Self {
        Self {
            name: name.into(),
            postgres_type: PostgresType::from_type_name(type_name),
        }
    }
}

/// Type mapper for converting PostgreSQL types to Arrow types.
pub struct TypeMapper;

impl TypeMapper {
    /// Convert a PostgreSQL type to an Arrow DataType.
    ///
    /// Types without a native columnar encoding map to `Utf8` and are carried
    /// in their text representation.
    pub fn postgres_to_arrow(postgres_type: &PostgresType) -> Result<DataType, ConversionError> {
        match postgres_type {
            PostgresType::Boolean => Ok(DataType::Boolean),
            PostgresType::SmallInt => Ok(DataType::Int16),
            PostgresType::Integer => Ok(DataType::Int32),
            PostgresType::BigInt | PostgresType::Oid => Ok(DataType::Int64),
            PostgresType::Real => Ok(DataType::Float32),
            PostgresType::DoublePrecision => Ok(DataType::Float64),
            PostgresType::Date => Ok(DataType::Date32),
            PostgresType::Time => Ok(DataType::Time64(TimeUnit::Microsecond)),
            PostgresType::Timestamp => Ok(DataType::Timestamp(TimeUnit::Microsecond, None)),
            // Sessions run in UTC, so timestamptz values arrive normalised.
            PostgresType::TimestampTz => Ok(DataType::Timestamp(
                TimeUnit::Microsecond,
                Some("UTC".into()),
            )),
            PostgresType::Bytea => Ok(DataType::Binary),
            PostgresType::Text => Ok(DataType::Utf8),
            PostgresType::Other(name) if name.is_empty() => {
                Err(ConversionError::UnsupportedType("<empty type name>".to_string()))
            }
            PostgresType::Other(_) => Ok(DataType::Utf8),
        }
    }

    /// Create Arrow field metadata preserving the PostgreSQL type name.
    pub fn create_field_metadata(postgres_type: &PostgresType) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert(
            POSTGRES_TYPE_METADATA_KEY.to_string(),
            postgres_type.type_name().to_string(),
        );
        metadata
    }

    /// Extract the PostgreSQL type from Arrow field metadata.
    ///
    /// Schemas built by [`TypeMapper::schema_from_columns`] always carry it.
    pub fn from_field_metadata(metadata: &HashMap<String, String>) -> Option<PostgresType> {
        metadata
            .get(POSTGRES_TYPE_METADATA_KEY)
            .map(|name| PostgresType::from_type_name(name))
    }

    /// Build the export schema from probed columns, preserving column order.
    ///
    /// All fields are nullable: a `LIMIT 1` probe cannot tell us otherwise.
    pub fn schema_from_columns(columns: &[ColumnDescriptor]) -> Result<SchemaRef, ConversionError> {
        let fields = columns
            .iter()
            .map(|column| {
                let data_type = Self::postgres_to_arrow(&column.postgres_type)?;
                Ok(Field::new(&column.name, data_type, true)
                    .with_metadata(Self::create_field_metadata(&column.postgres_type)))
            })
            .collect::<Result<Vec<Field>, ConversionError>>()?;

        Ok(Arc::new(Schema::new(fields)))
    }
}
