//! Lightweight classification of SQL text.
//!
//! Not a parser: only what statement preparation needs to decide on
//! `RETURNING` emulation and whether a statement yields rows.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LEADING_COMMENTS: Regex =
        Regex::new(r"^(?:\s+|--[^\n]*(?:\n|$)|/\*(?s:.*?)\*/)*").expect("valid regex");
    static ref INSERT: Regex = Regex::new(r"(?i)^insert\b").expect("valid regex");
    static ref ROW_RETURNING: Regex = Regex::new(
        r"(?i)^(?:select|with|values|pragma|show|describe|explain|table|from|summarize)\b"
    )
    .expect("valid regex");
    static ref RETURNING: Regex = Regex::new(r"(?i)\breturning\b").expect("valid regex");
    static ref ROWID: Regex = Regex::new(r"(?i)\browid\b").expect("valid regex");
    static ref ORDER_BY: Regex = Regex::new(r"(?i)\border\s+by\b").expect("valid regex");
    static ref LIMIT: Regex = Regex::new(r"(?i)\blimit\s+\d+").expect("valid regex");
}

fn body(sql: &str) -> &str {
    let skip = LEADING_COMMENTS.find(sql).map_or(0, |m| m.end());
    &sql[skip..]
}

/// Whether `sql` is a single `INSERT` statement.
#[must_use]
pub fn is_insert(sql: &str) -> bool {
    INSERT.is_match(body(sql)) && !is_compound(sql)
}

/// Whether `sql` already asks the engine for identity values.
#[must_use]
#[cfg_attr(not(any(feature = "duckdb", feature = "postgres")), allow(dead_code))]
pub fn requests_identity(sql: &str) -> bool {
    RETURNING.is_match(sql) || ROWID.is_match(sql)
}

/// Whether `sql` is expected to produce a result set.
#[must_use]
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
pub fn returns_rows(sql: &str) -> bool {
    ROW_RETURNING.is_match(body(sql)) || RETURNING.is_match(sql)
}

/// Whether `sql` is a pure query (no data change).
#[must_use]
pub fn is_query(sql: &str) -> bool {
    ROW_RETURNING.is_match(body(sql))
}

#[must_use]
pub fn has_order_by(sql: &str) -> bool {
    ORDER_BY.is_match(sql)
}

#[must_use]
pub fn has_limit(sql: &str) -> bool {
    LIMIT.is_match(sql)
}

/// More than one statement separated by `;` (a trailing `;` does not count).
#[must_use]
pub fn is_compound(sql: &str) -> bool {
    let trimmed = sql.trim_end().trim_end_matches(';');
    let mut in_quote = false;
    for ch in trimmed.chars() {
        match ch {
            '\'' => in_quote = !in_quote,
            ';' if !in_quote => return true,
            _ => {}
        }
    }
    false
}

/// Append `RETURNING <id_column>` to an insert that does not request identity yet.
///
/// Returns `None` when emulation does not apply.
#[must_use]
#[cfg_attr(not(any(feature = "duckdb", feature = "postgres")), allow(dead_code))]
pub fn with_returning(sql: &str, id_column: &str) -> Option<String> {
    if !is_insert(sql) || requests_identity(sql) {
        return None;
    }
    let trimmed = sql.trim_end().trim_end_matches(';').trim_end();
    Some(format!("{trimmed} RETURNING {id_column}"))
}
