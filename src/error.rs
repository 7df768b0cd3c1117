use thiserror::Error;

/// Error code used when a backend reports a failure without a native numeric code.
pub const UNKNOWN_ERROR_CODE: i64 = -1;

#[derive(Debug, Error)]
pub enum SqlConnectError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend rejected a statement at prepare or execute time.
    ///
    /// `code` is the backend-native code, preserved verbatim.
    #[error("SQL error {code}: {message}{}", sql_suffix(.sql))]
    Sql {
        code: i64,
        message: String,
        sql: Option<String>,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Null blob in column {0}")]
    NullBlob(usize),

    #[error("Statement error: {0}")]
    StatementError(String),

    #[error("Statement was prepared before a reconnect: {0}")]
    StaleStatement(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Transient error persisted after reconnect: {0}")]
    Transient(String),

    /// Online backup or restore of a database file failed.
    #[error("Backup error: {0}")]
    BackupError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Other database error: {0}")]
    Other(String),
}

fn sql_suffix(sql: &Option<String>) -> String {
    sql.as_deref().map(|s| format!(" ({s})")).unwrap_or_default()
}

impl SqlConnectError {
    /// Build a SQL execution error.
    pub fn sql(code: i64, message: impl Into<String>, sql: Option<&str>) -> Self {
        SqlConnectError::Sql {
            code,
            message: message.into(),
            sql: sql.map(str::to_owned),
        }
    }

    /// Attach the originating SQL text to a SQL execution error that lacks it.
    #[must_use]
    pub fn with_sql(self, text: &str) -> Self {
        match self {
            SqlConnectError::Sql {
                code,
                message,
                sql: None,
            } => SqlConnectError::Sql {
                code,
                message,
                sql: Some(text.to_owned()),
            },
            other => other,
        }
    }

    /// Backend-native error code for SQL execution errors.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            SqlConnectError::Sql { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for SqlConnectError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi_err, msg) => SqlConnectError::Sql {
                code: i64::from(ffi_err.extended_code),
                message: msg.unwrap_or_else(|| ffi_err.to_string()),
                sql: None,
            },
            other => SqlConnectError::Sql {
                code: UNKNOWN_ERROR_CODE,
                message: other.to_string(),
                sql: None,
            },
        }
    }
}

#[cfg(feature = "duckdb")]
impl From<duckdb::Error> for SqlConnectError {
    fn from(err: duckdb::Error) -> Self {
        match err {
            duckdb::Error::DuckDBFailure(ffi_err, msg) => SqlConnectError::Sql {
                code: i64::from(ffi_err.extended_code),
                message: msg.unwrap_or_else(|| ffi_err.to_string()),
                sql: None,
            },
            other => SqlConnectError::Sql {
                code: UNKNOWN_ERROR_CODE,
                message: other.to_string(),
                sql: None,
            },
        }
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for SqlConnectError {
    fn from(err: tokio_postgres::Error) -> Self {
        // SQLSTATE is five characters; numeric states keep their value, the rest map to -1.
        match err.as_db_error() {
            Some(db_err) => {
                let state = db_err.code().code();
                SqlConnectError::Sql {
                    code: state.parse::<i64>().unwrap_or(UNKNOWN_ERROR_CODE),
                    message: format!("{} (SQLSTATE {state})", db_err.message()),
                    sql: None,
                }
            }
            None if err.is_closed() => SqlConnectError::Transient(err.to_string()),
            None => SqlConnectError::Sql {
                code: UNKNOWN_ERROR_CODE,
                message: err.to_string(),
                sql: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_sql_only_fills_missing_text() {
        let err = SqlConnectError::sql(1, "boom", None).with_sql("SELECT 1");
        assert_eq!(
            err.to_string(),
            "SQL error 1: boom (SELECT 1)".to_string()
        );

        let kept = SqlConnectError::sql(2, "boom", Some("a")).with_sql("b");
        assert!(matches!(kept, SqlConnectError::Sql { sql: Some(ref s), .. } if s == "a"));
        assert_eq!(kept.code(), Some(2));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_failure_keeps_native_code() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: SqlConnectError = conn.execute_batch("SELEC 1").unwrap_err().into();
        // SQLITE_ERROR
        assert_eq!(err.code(), Some(1));
    }
}
