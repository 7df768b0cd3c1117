use std::time::Duration;

use rusqlite::OpenFlags;

use crate::error::SqlConnectError;
use crate::parameter::Parameter;

use super::SqliteConnect;

/// Options for opening a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub read_only: bool,
    /// SQL run once right after opening, typically `ATTACH DATABASE ...`.
    pub attach: Option<String>,
    /// Switch the file to `journal_mode = WAL`.
    pub wal: bool,
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            read_only: false,
            attach: None,
            wal: false,
            busy_timeout: None,
        }
    }

    /// Read the options from a parameter bag.
    ///
    /// Keys: `db` (required), `access_mode` (`READ_WRITE` or `READ_ONLY`),
    /// `attach`, `wal`, `busy_timeout_ms`.
    ///
    /// # Errors
    ///
    /// `ConfigError` when `db` is missing, a key has the wrong kind, or
    /// `access_mode` is not recognised.
    pub fn from_params(param: &Parameter) -> Result<Self, SqlConnectError> {
        let db_path: String = param
            .get("db")
            .map_err(|e| SqlConnectError::ConfigError(format!("sqlite: {e}")))?;
        let access_mode: String = param.try_get("access_mode", "READ_WRITE".to_string());
        let read_only = match access_mode.to_ascii_uppercase().as_str() {
            "READ_WRITE" => false,
            "READ_ONLY" => true,
            other => {
                return Err(SqlConnectError::ConfigError(format!(
                    "sqlite: unknown access_mode {other}"
                )));
            }
        };
        let attach: String = param.try_get("attach", String::new());
        let busy_ms: i64 = param.try_get("busy_timeout_ms", 0);
        let busy_timeout = u64::try_from(busy_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Ok(Self {
            db_path,
            read_only,
            attach: (!attach.is_empty()).then_some(attach),
            wal: param.try_get("wal", false),
            busy_timeout,
        })
    }

    pub(super) fn open_flags(&self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.read_only {
            base | OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        }
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn attach(mut self, sql: impl Into<String>) -> Self {
        self.opts.attach = Some(sql.into());
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// See [`SqliteConnect::open`].
    pub fn build(self) -> Result<SqliteConnect, SqlConnectError> {
        SqliteConnect::open(self.finish())
    }
}
