use duckdb::{AccessMode, Config};

use crate::error::SqlConnectError;
use crate::parameter::Parameter;

use super::DuckConnect;

/// Options for opening a `DuckDB` database.
#[derive(Debug, Clone)]
pub struct DuckOptions {
    /// Database file, or `:memory:`.
    pub db_path: String,
    pub read_only: bool,
    /// SQL run once right after opening, typically `ATTACH ...`.
    pub attach: Option<String>,
}

impl DuckOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            read_only: false,
            attach: None,
        }
    }

    /// Read the options from a parameter bag.
    ///
    /// Keys: `db` (required), `access_mode` (`READ_WRITE` or `READ_ONLY`), `attach`.
    ///
    /// # Errors
    ///
    /// `ConfigError` when `db` is missing or a key is malformed.
    pub fn from_params(param: &Parameter) -> Result<Self, SqlConnectError> {
        let db_path: String = param
            .get("db")
            .map_err(|e| SqlConnectError::ConfigError(format!("duckdb: {e}")))?;
        let access_mode: String = param.try_get("access_mode", "READ_WRITE".to_string());
        let read_only = match access_mode.to_ascii_uppercase().as_str() {
            "READ_WRITE" => false,
            "READ_ONLY" => true,
            other => {
                return Err(SqlConnectError::ConfigError(format!(
                    "duckdb: unknown access_mode {other}"
                )));
            }
        };
        let attach: String = param.try_get("attach", String::new());
        Ok(Self {
            db_path,
            read_only,
            attach: (!attach.is_empty()).then_some(attach),
        })
    }

    pub(super) fn config(&self) -> Result<Config, SqlConnectError> {
        let mode = if self.read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        Config::default()
            .access_mode(mode)
            .map_err(|e| SqlConnectError::ConfigError(format!("duckdb: {e}")))
    }
}

/// Fluent builder for `DuckDB` options.
#[derive(Debug, Clone)]
pub struct DuckOptionsBuilder {
    opts: DuckOptions,
}

impl DuckOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: DuckOptions::new(db_path),
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
    pub fn finish(self) -> DuckOptions {
        self.opts
    }

    /// # Errors
    ///
    /// See [`DuckConnect::open`].
    pub fn build(self) -> Result<DuckConnect, SqlConnectError> {
        DuckConnect::open(self.finish())
    }
}
