use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;

/// Values that can be bound to a statement or read back from a result column.
///
/// Every backend converts to and from this enum, so entity mapping and batch
/// code never branch on driver types:
/// ```rust
/// use sql_connect::prelude::*;
///
/// let values = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Null,
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value; bound as 0/1 where the engine has no native boolean
    Bool(bool),
    /// Timestamp value without time zone
    Timestamp(NaiveDateTime),
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(value) => Some(*value),
            SqlValue::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }

    /// Timestamps come back as text from engines without a native type.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(value) => Some(*value),
            SqlValue::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Integers widen to floating point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Short storage-class name used in type-mismatch messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "double",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "bool",
            SqlValue::Timestamp(_) => "datetime",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// Render the value as a SQL literal, quoting text and timestamps.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) if v.is_nan() => "NULL".to_string(),
            SqlValue::Float(v) => v.to_string(),
            SqlValue::Bool(v) => i64::from(*v).to_string(),
            SqlValue::Text(s) => quote_literal(s),
            SqlValue::Timestamp(ts) => quote_literal(&format_timestamp(ts)),
            SqlValue::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            SqlValue::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

macro_rules! sql_value_from_int {
    ($($ty:ty),*) => {$(
        impl From<$ty> for SqlValue {
            fn from(v: $ty) -> Self {
                SqlValue::Int(i64::from(v))
            }
        }
    )*};
}

sql_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

/// Format used when a timestamp is stored as text.
pub(crate) const TIMESTAMP_TEXT_FORMAT: &str = "%F %T%.f";

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_TEXT_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub(crate) fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// The backend engines this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum BackendKind {
    /// `SQLite` file or in-memory database
    #[cfg(feature = "sqlite")]
    Sqlite,
    /// `DuckDB` columnar database
    #[cfg(feature = "duckdb")]
    Duckdb,
    /// `PostgreSQL` (or `TimescaleDB`) server
    #[cfg(feature = "postgres")]
    Postgres,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => "sqlite",
            #[cfg(feature = "duckdb")]
            BackendKind::Duckdb => "duckdb",
            #[cfg(feature = "postgres")]
            BackendKind::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

/// Outcome of a statement that does not return rows.
///
/// Some engines cannot report how many rows a batch of SQL touched; those
/// report `Unknown` instead of a made-up count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsAffected {
    Exact(u64),
    Unknown,
}

impl RowsAffected {
    /// The exact count, when the backend reported one.
    #[must_use]
    pub fn exact(self) -> Option<u64> {
        match self {
            RowsAffected::Exact(n) => Some(n),
            RowsAffected::Unknown => None,
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        matches!(self, RowsAffected::Exact(_))
    }
}

impl fmt::Display for RowsAffected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowsAffected::Exact(n) => write!(f, "{n}"),
            RowsAffected::Unknown => f.write_str("unknown"),
        }
    }
}
