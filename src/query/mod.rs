//! SQL text used by the exporter.
//!
//! The exporter never parses SQL. It only needs a handful of fixed catalog
//! queries, the default full-scan query for a table, and the `LIMIT 1`
//! rewrite used to probe a query's result schema.

mod probe;

pub use probe::format_query_with_limit;

use crate::error::ValidationError;

/// Lists every table in the `public` schema of the current database.
pub const SELECT_TABLES_QUERY: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public';";

/// Build the full-scan query for a table.
///
/// The name is quoted as an identifier so mixed-case names from the catalog
/// resolve to the same table.
///
/// # Example
///
/// ```
/// use pg2parquet::query::default_query;
///
/// assert_eq!(default_query("users"), r#"SELECT * FROM "users";"#);
/// ```
#[must_use]
pub fn default_query(table: &str) -> String {
    format!("SELECT * FROM {};", quote_identifier(table))
}

/// Quote an identifier, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Reject query text that does not contain a `SELECT` keyword.
///
/// The check is a case-insensitive substring test, run before any connection
/// is made.
pub fn validate_select(query: &str) -> Result<(), ValidationError> {
    if query.to_lowercase().contains("select") {
        Ok(())
    } else {
        Err(ValidationError::InvalidQuery(
            "Query must contain a SELECT statement.".to_string(),
        ))
    }
}
