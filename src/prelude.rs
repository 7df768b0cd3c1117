//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits so that a
//! single `use sql_connect::prelude::*;` is enough to open a connection, map
//! entities and run queries.

pub use crate::batch::BATCH_BULK_THRESHOLD;
pub use crate::condition::{DbCondition, Field, SortDirection};
pub use crate::connection::{DbConnect, DbConnectExt};
pub use crate::conversion::{FromSqlValue, Json, NULL_DATETIME, ToSqlValue};
pub use crate::entity::Entity;
pub use crate::error::SqlConnectError;
pub use crate::paging::{DEFAULT_PAGE_SIZE, ResultPages};
pub use crate::parameter::{ParamKind, ParamValue, Parameter};
pub use crate::results::{DbRow, ResultSet};
pub use crate::statement::{ColumnReader, RowSource, RowSourceExt, SqlStatement, SqlStatementExt};
pub use crate::transaction::{AutoTransaction, ManualTransaction, TxState};
pub use crate::translation::{PlaceholderStyle, translate_placeholders};
pub use crate::types::{BackendKind, RowsAffected, SqlValue};

#[cfg(feature = "duckdb")]
pub use crate::duck::{DuckConnect, DuckOptions, DuckOptionsBuilder};
#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresConnect, PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnect, SqliteOptions, SqliteOptionsBuilder};
