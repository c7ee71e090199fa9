//! `LIMIT 1` rewriting for schema probes.

use std::sync::LazyLock;

use regex::Regex;

/// A `LIMIT` clause with its argument: a number, `ALL`, a parenthesized
/// expression or a bind parameter.
static LIMIT_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blimit\s+(?:\d+\b|all\b|\([^)]*\)|\$\d+\b)").expect("valid limit regex")
});

const PROBE_LIMIT: &str = "LIMIT 1";

/// Rewrite a query so that it returns at most one row.
///
/// Every `;` is removed first. Each `LIMIT` clause (any case, any whitespace
/// between keyword and argument) becomes `LIMIT 1` and a single terminator is
/// added at the end. When no such clause exists, ` LIMIT 1;` is appended.
///
/// # Example
///
/// ```
/// use pg2parquet::query::format_query_with_limit;
///
/// assert_eq!(
///     format_query_with_limit("SELECT * FROM t LIMIT 10"),
///     "SELECT * FROM t LIMIT 1;"
/// );
/// assert_eq!(
///     format_query_with_limit("SELECT * FROM t LIMIT ALL;"),
///     "SELECT * FROM t LIMIT 1;"
/// );
/// ```
#[must_use]
pub fn format_query_with_limit(query: &str) -> String {
    let query = query.replace(';', "");
    if !LIMIT_CLAUSE_RE.is_match(&query) {
        return format!("{query} LIMIT 1;");
    }
    let mut rewritten = LIMIT_CLAUSE_RE
        .replace_all(&query, PROBE_LIMIT)
        .into_owned();
    rewritten.push(';');
    rewritten
}
