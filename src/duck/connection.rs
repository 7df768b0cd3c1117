use std::cell::Cell;
use std::path::Path;

use duckdb::types::Value;
use duckdb::{Connection, ToSql};
use tracing::{debug, error, trace, warn};

use crate::batch;
use crate::connection::DbConnect;
use crate::error::SqlConnectError;
use crate::parameter::Parameter;
use crate::statement::SqlStatement;
use crate::translation::{PlaceholderStyle, translate_placeholders};
use crate::types::{BackendKind, RowsAffected, SqlValue, quote_literal};

use super::config::{DuckOptions, DuckOptionsBuilder};
use super::params::to_duck_value;
use super::statement::DuckStatement;

/// A session on one `DuckDB` database.
///
/// Identities come from a per-table sequence named `<table>_id_seq`, the
/// convention `reset_auto_increment` and the appender bulk path rely on.
pub struct DuckConnect {
    conn: Connection,
    name: String,
    in_tx: Cell<bool>,
}

impl DuckConnect {
    #[must_use]
    pub fn builder(db_path: String) -> DuckOptionsBuilder {
        DuckOptionsBuilder::new(db_path)
    }

    /// Open the database and enable automatic extension loading.
    ///
    /// # Errors
    ///
    /// `ConnectionError` when the database cannot be opened or a setup
    /// statement fails; the half-open handle is closed first.
    pub fn open(opts: DuckOptions) -> Result<Self, SqlConnectError> {
        let config = opts.config()?;
        let conn = Connection::open_with_flags(&opts.db_path, config).map_err(|e| {
            SqlConnectError::ConnectionError(format!("failed to open {}: {e}", opts.db_path))
        })?;

        let setup = || -> Result<(), duckdb::Error> {
            conn.execute_batch(
                "SET autoinstall_known_extensions=1; SET autoload_known_extensions=1;",
            )?;
            if let Some(attach) = &opts.attach {
                conn.execute_batch(attach)?;
            }
            Ok(())
        };
        if let Err(e) = setup() {
            if let Err((_, close_err)) = conn.close() {
                warn!(db = %opts.db_path, error = %close_err, "failed to close duckdb handle");
            }
            return Err(SqlConnectError::ConnectionError(format!(
                "failed to set up {}: {e}",
                opts.db_path
            )));
        }

        debug!(db = %opts.db_path, read_only = opts.read_only, "duckdb connection opened");
        Ok(Self {
            conn,
            name: opts.db_path,
            in_tx: Cell::new(false),
        })
    }

    /// # Errors
    ///
    /// `ConfigError` for bad parameters, then as [`DuckConnect::open`].
    pub fn from_params(param: &Parameter) -> Result<Self, SqlConnectError> {
        Self::open(DuckOptions::from_params(param)?)
    }

    /// # Errors
    ///
    /// `ConnectionError` if `DuckDB` cannot start an in-memory database.
    pub fn open_in_memory() -> Result<Self, SqlConnectError> {
        Self::open(DuckOptions::new(":memory:".to_string()))
    }

    /// Export schema and data to the directory `path`.
    ///
    /// # Errors
    ///
    /// `Sql` if the export fails.
    pub fn export_database(&self, path: &Path) -> Result<(), SqlConnectError> {
        let target = quote_literal(&path.to_string_lossy());
        self.exec(&format!("EXPORT DATABASE {target}")).map(|_| ())
    }

    /// Column names and declared types of `table`, in table order.
    ///
    /// # Errors
    ///
    /// `Sql` if the table does not exist.
    pub fn table_info(&self, table: &str) -> Result<Vec<(String, String)>, SqlConnectError> {
        let rs = self.query_result_set(&format!("DESCRIBE {table}"), &[])?;
        Ok(rs
            .iter()
            .map(|row| {
                let text = |i| {
                    row.get_by_index(i)
                        .and_then(SqlValue::as_text)
                        .unwrap_or_default()
                        .to_string()
                };
                (text(0), text(1))
            })
            .collect())
    }

    /// Close the session, reporting errors `Drop` would swallow.
    ///
    /// # Errors
    ///
    /// `ConnectionError` if `DuckDB` refuses to close.
    pub fn close(self) -> Result<(), SqlConnectError> {
        self.conn
            .close()
            .map_err(|(_, e)| SqlConnectError::ConnectionError(format!("close failed: {e}")))
    }

    fn next_ids(&self, table: &str, n: usize) -> Result<Vec<u64>, SqlConnectError> {
        let rs = self.query_result_set(
            &format!("SELECT nextval('{table}_id_seq') FROM range({n})"),
            &[],
        )?;
        rs.iter()
            .map(|row| {
                row.get_by_index(0)
                    .and_then(SqlValue::as_int)
                    .and_then(|id| u64::try_from(id).ok())
                    .ok_or_else(|| SqlConnectError::TypeMismatch("sequence value".to_string()))
            })
            .collect()
    }
}

/// Whether `path` opens as a `DuckDB` database and answers a query.
#[must_use]
pub fn is_valid_duckdb_file(path: &Path) -> bool {
    let mut opts = DuckOptions::new(path.to_string_lossy().into_owned());
    opts.read_only = true;
    DuckConnect::open(opts).is_ok_and(|conn| conn.ping())
}

impl DbConnect for DuckConnect {
    fn backend(&self) -> BackendKind {
        BackendKind::Duckdb
    }

    fn db_name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> bool {
        self.conn.execute_batch("SELECT 1").is_ok()
    }

    /// `DuckDB` reports no change count for batches of SQL.
    fn exec(&self, sql: &str) -> Result<RowsAffected, SqlConnectError> {
        trace!(sql, "duckdb exec");
        self.conn
            .execute_batch(sql)
            .map_err(|e| SqlConnectError::from(e).with_sql(sql))?;
        Ok(RowsAffected::Unknown)
    }

    fn statement(&self, sql: &str) -> Result<Box<dyn SqlStatement + '_>, SqlConnectError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        Ok(Box::new(DuckStatement::prepare(&self.conn, &sql, "id")?))
    }

    fn transaction(&self) -> Result<(), SqlConnectError> {
        if self.in_tx.get() {
            return Err(SqlConnectError::TransactionError(
                "transaction already in progress".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        self.in_tx.set(true);
        Ok(())
    }

    fn commit(&self) -> Result<(), SqlConnectError> {
        if !self.in_tx.get() {
            return Err(SqlConnectError::TransactionError(
                "commit without an active transaction".to_string(),
            ));
        }
        let result = self.conn.execute_batch("COMMIT");
        // A failed COMMIT aborts the transaction in DuckDB.
        self.in_tx.set(false);
        result?;
        Ok(())
    }

    fn rollback(&self) -> bool {
        if !self.in_tx.get() {
            return false;
        }
        self.in_tx.set(false);
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => true,
            Err(e) => {
                error!(db = %self.name, error = %e, "duckdb rollback failed");
                false
            }
        }
    }

    fn in_transaction(&self) -> bool {
        self.in_tx.get()
    }

    fn supports_savepoints(&self) -> bool {
        false
    }

    fn table_exist(&self, name: &str) -> bool {
        self.conn
            .query_row(
                "SELECT COUNT(1) FROM information_schema.tables WHERE table_name = ?",
                duckdb::params![name],
                |row| row.get::<_, i64>(0),
            )
            .is_ok_and(|n| n > 0)
    }

    fn table_names(&self) -> Result<Vec<String>, SqlConnectError> {
        let mut st = self.conn.prepare(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        let names = st
            .query_map(duckdb::params![], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Restart `<table>_id_seq`; a table without that sequence is left alone.
    fn reset_auto_increment(&self, table: &str) -> Result<(), SqlConnectError> {
        let sql = format!("ALTER SEQUENCE {table}_id_seq RESTART WITH 1");
        if let Err(e) = self.conn.execute_batch(&sql) {
            debug!(table, error = %e, "no identity sequence to reset");
        }
        Ok(())
    }

    /// Appender bulk path: identities are drawn from `<table>_id_seq` up
    /// front, then every row is appended in table column order.
    fn bulk_insert(
        &self,
        table: &str,
        id_column: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<u64>, SqlConnectError> {
        let layout = self.table_info(table)?;
        let ids = self.next_ids(table, rows.len())?;

        let mut appender = self.conn.appender(table)?;
        for (row, id) in rows.iter().zip(&ids) {
            let mut full = Vec::with_capacity(layout.len());
            for (name, _) in &layout {
                let value = if name == id_column {
                    Value::BigInt(i64::try_from(*id).unwrap_or(i64::MAX))
                } else {
                    columns
                        .iter()
                        .position(|c| c == name)
                        .and_then(|pos| row.get(pos))
                        .map_or(Value::Null, to_duck_value)
                };
                full.push(value);
            }
            let refs: Vec<&dyn ToSql> = full.iter().map(|v| v as &dyn ToSql).collect();
            appender.append_row(refs.as_slice())?;
        }
        appender.flush()?;
        debug!(table, count = rows.len(), "duckdb appender bulk insert");
        Ok(ids)
    }

    fn bulk_update(
        &self,
        table: &str,
        id_column: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<(), SqlConnectError> {
        batch::values_alias_update(self, table, id_column, columns, rows)
    }
}
