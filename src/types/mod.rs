//! Type mapping between PostgreSQL and Arrow data types.

mod mapping;
mod value;

pub use mapping::{ColumnDescriptor, PostgresType, TypeMapper, POSTGRES_TYPE_METADATA_KEY};
pub use value::{Row, Value};
