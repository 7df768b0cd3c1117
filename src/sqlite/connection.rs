use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, error, trace, warn};

use crate::connection::{DbConnect, DbConnectExt};
use crate::error::SqlConnectError;
use crate::parameter::Parameter;
use crate::statement::SqlStatement;
use crate::translation::{PlaceholderStyle, translate_placeholders};
use crate::types::{BackendKind, RowsAffected, quote_literal};

use super::config::{SqliteOptions, SqliteOptionsBuilder};
use super::statement::SqliteStatement;

/// A session on one `SQLite` database file.
pub struct SqliteConnect {
    conn: Connection,
    name: String,
}

impl SqliteConnect {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Open (and create, unless read-only) the database file.
    ///
    /// # Errors
    ///
    /// `ConnectionError` when the file cannot be opened or a setup statement
    /// (`journal_mode`, `attach`) fails; the half-open handle is closed first.
    pub fn open(opts: SqliteOptions) -> Result<Self, SqlConnectError> {
        let conn = Connection::open_with_flags(&opts.db_path, opts.open_flags()).map_err(|e| {
            SqlConnectError::ConnectionError(format!("failed to open {}: {e}", opts.db_path))
        })?;

        let setup = || -> Result<(), rusqlite::Error> {
            if let Some(timeout) = opts.busy_timeout {
                conn.busy_timeout(timeout)?;
            }
            if opts.wal && !opts.read_only {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                ",
                )?;
            }
            if let Some(attach) = &opts.attach {
                conn.execute_batch(attach)?;
            }
            Ok(())
        };
        if let Err(e) = setup() {
            if let Err((_, close_err)) = conn.close() {
                warn!(db = %opts.db_path, error = %close_err, "failed to close sqlite handle");
            }
            return Err(SqlConnectError::ConnectionError(format!(
                "failed to set up {}: {e}",
                opts.db_path
            )));
        }

        debug!(db = %opts.db_path, read_only = opts.read_only, "sqlite connection opened");
        Ok(Self {
            conn,
            name: opts.db_path,
        })
    }

    /// Open from a parameter bag; see [`SqliteOptions::from_params`].
    ///
    /// # Errors
    ///
    /// `ConfigError` for bad parameters, then as [`SqliteConnect::open`].
    pub fn from_params(param: &Parameter) -> Result<Self, SqlConnectError> {
        Self::open(SqliteOptions::from_params(param)?)
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// `ConnectionError` if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, SqlConnectError> {
        Self::open(SqliteOptions::new(":memory:".to_string()))
    }

    /// Write a consistent copy of the database to `path`.
    ///
    /// # Errors
    ///
    /// `Sql` if the target exists or cannot be written.
    pub fn vacuum_into(&self, path: &Path) -> Result<(), SqlConnectError> {
        let target = quote_literal(&path.to_string_lossy());
        self.exec(&format!("VACUUM INTO {target}")).map(|_| ())
    }

    /// Run `PRAGMA quick_check` (or the full `integrity_check`). Returns
    /// whether the database reported `ok`.
    ///
    /// # Errors
    ///
    /// `Sql` when the pragma itself cannot run.
    pub fn check(&self, quick: bool) -> Result<bool, SqlConnectError> {
        let pragma = if quick { "quick_check" } else { "integrity_check" };
        let rs = self.query_result_set(&format!("PRAGMA {pragma}"), &[])?;
        let ok = rs.len() == 1
            && rs
                .iter()
                .next()
                .and_then(|row| row.get_by_index(0))
                .and_then(|v| v.as_text())
                == Some("ok");
        if !ok {
            warn!(db = %self.name, pragma, problems = rs.len(), "sqlite integrity check failed");
        }
        Ok(ok)
    }

    pub(super) fn raw(&self) -> &Connection {
        &self.conn
    }

    /// Close the session, reporting errors `Drop` would swallow.
    ///
    /// # Errors
    ///
    /// `ConnectionError` if `SQLite` refuses to close.
    pub fn close(self) -> Result<(), SqlConnectError> {
        self.conn
            .close()
            .map_err(|(_, e)| SqlConnectError::ConnectionError(format!("close failed: {e}")))
    }
}

impl DbConnect for SqliteConnect {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn db_name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> bool {
        self.conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
    }

    fn exec(&self, sql: &str) -> Result<RowsAffected, SqlConnectError> {
        trace!(sql, "sqlite exec");
        let before = self.query_number("SELECT total_changes()")?;
        self.conn
            .execute_batch(sql)
            .map_err(|e| SqlConnectError::from(e).with_sql(sql))?;
        let after = self.query_number("SELECT total_changes()")?;
        Ok(RowsAffected::Exact(
            u64::try_from(after.saturating_sub(before)).unwrap_or(0),
        ))
    }

    fn statement(&self, sql: &str) -> Result<Box<dyn SqlStatement + '_>, SqlConnectError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        Ok(Box::new(SqliteStatement::prepare(&self.conn, &sql)?))
    }

    fn transaction(&self) -> Result<(), SqlConnectError> {
        if self.in_transaction() {
            return Err(SqlConnectError::TransactionError(
                "transaction already in progress".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), SqlConnectError> {
        if !self.in_transaction() {
            return Err(SqlConnectError::TransactionError(
                "commit without an active transaction".to_string(),
            ));
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> bool {
        if !self.in_transaction() {
            return false;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => true,
            Err(e) => {
                error!(db = %self.name, error = %e, "sqlite rollback failed");
                false
            }
        }
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn table_exist(&self, name: &str) -> bool {
        self.conn
            .query_row(
                "SELECT COUNT(1) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [name],
                |row| row.get::<_, i64>(0),
            )
            .is_ok_and(|n| n > 0)
    }

    fn table_names(&self) -> Result<Vec<String>, SqlConnectError> {
        let mut st = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = st
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn reset_auto_increment(&self, table: &str) -> Result<(), SqlConnectError> {
        // sqlite_sequence only exists once an AUTOINCREMENT table has been created.
        if !self.table_exist("sqlite_sequence") {
            return Ok(());
        }
        self.conn
            .execute("DELETE FROM sqlite_sequence WHERE name = ?1", [table])?;
        Ok(())
    }
}
