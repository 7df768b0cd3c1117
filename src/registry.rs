//! Choose a backend at runtime.
//!
//! ```rust,no_run
//! use sql_connect::prelude::*;
//!
//! # fn demo() -> Result<(), SqlConnectError> {
//! let mut param = Parameter::new();
//! param.set("db", "app.db")?;
//! let conn = sql_connect::registry::open(BackendKind::Sqlite, &param)?;
//! assert!(conn.ping());
//! # Ok(())
//! # }
//! ```

use tracing::info;

use crate::connection::DbConnect;
use crate::error::SqlConnectError;
use crate::parameter::Parameter;
use crate::types::BackendKind;

/// Open a connection of the given kind, configured from `param`.
///
/// # Errors
///
/// `ConfigError` or `ConnectionError` from the backend constructor.
pub fn open(kind: BackendKind, param: &Parameter) -> Result<Box<dyn DbConnect>, SqlConnectError> {
    info!(backend = %kind, "opening connection");
    let conn: Box<dyn DbConnect> = match kind {
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => Box::new(crate::sqlite::SqliteConnect::from_params(param)?),
        #[cfg(feature = "duckdb")]
        BackendKind::Duckdb => Box::new(crate::duck::DuckConnect::from_params(param)?),
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => Box::new(crate::postgres::PostgresConnect::from_params(param)?),
    };
    Ok(conn)
}

/// Like [`open`], reading the backend from the `backend` key of `param`
/// (`sqlite`, `duckdb` or `postgres`).
///
/// # Errors
///
/// `ConfigError` when `backend` is missing or names a backend this build
/// does not include, then as [`open`].
pub fn open_from_params(param: &Parameter) -> Result<Box<dyn DbConnect>, SqlConnectError> {
    let name: String = param
        .get("backend")
        .map_err(|e| SqlConnectError::ConfigError(e.to_string()))?;
    let kind = <BackendKind as clap::ValueEnum>::from_str(&name, true)
        .map_err(|e| SqlConnectError::ConfigError(format!("backend {name}: {e}")))?;
    open(kind, param)
}
