//! Synchronous, backend-agnostic SQL access.
//!
//! One [`DbConnect`] trait fronts `SQLite`, `DuckDB` and `PostgreSQL`. On top
//! of it sit typed statement binding, [`Entity`] mapping for record types,
//! batch writes that switch to multi-row SQL for large sets, scoped
//! transactions and lazily paged query results.
//!
//! ```rust,no_run
//! use sql_connect::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Person {
//!     id: u64,
//!     name: String,
//!     age: i32,
//! }
//! sql_connect::impl_entity!(Person, "person", [name, age]);
//!
//! # fn demo() -> Result<(), SqlConnectError> {
//! let conn = SqliteConnect::open_in_memory()?;
//! conn.exec("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")?;
//!
//! let mut ada = Person { name: "Ada".into(), age: 36, ..Default::default() };
//! conn.save(&mut ada)?;
//! assert!(ada.id > 0);
//!
//! let mut adults: Vec<Person> = Vec::new();
//! conn.batch_load(&mut adults, Field::new("age").ge(18))?;
//! assert_eq!(adults.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod condition;
pub mod connection;
pub mod conversion;
pub mod entity;
pub mod error;
pub mod paging;
pub mod parameter;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod statement;
pub mod transaction;
pub mod translation;
pub mod types;

mod sql_text;

#[cfg(feature = "duckdb")]
pub mod duck;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use condition::{DbCondition, Field, SortDirection};
pub use connection::{DbConnect, DbConnectExt};
pub use entity::Entity;
pub use error::SqlConnectError;
pub use paging::ResultPages;
pub use parameter::Parameter;
pub use results::{DbRow, ResultSet};
pub use statement::{RowSource, RowSourceExt, SqlStatement, SqlStatementExt};
pub use transaction::{AutoTransaction, ManualTransaction};
pub use types::{BackendKind, RowsAffected, SqlValue};
