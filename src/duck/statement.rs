use duckdb::types::Value;
use duckdb::{Connection, Statement, params_from_iter};
use tracing::trace;

use crate::error::SqlConnectError;
use crate::sql_text;
use crate::statement::{ParamSlots, RowCursor, RowSource, SqlStatement};
use crate::types::{RowsAffected, SqlValue};

use super::params::{from_duck_value, to_duck_value};

/// Prepared `DuckDB` statement.
///
/// Inserts that do not ask for identities get `RETURNING id` appended at
/// prepare time; the returned identity becomes [`SqlStatement::last_rowid`]
/// and the synthetic row is never shown to callers.
pub struct DuckStatement<'c> {
    stmt: Statement<'c>,
    sql: String,
    params: ParamSlots,
    cursor: RowCursor,
    yields_rows: bool,
    emulated_returning: bool,
    last_rowid: u64,
    affected: RowsAffected,
}

impl<'c> DuckStatement<'c> {
    pub(super) fn prepare(
        conn: &'c Connection,
        sql: &str,
        id_column: &str,
    ) -> Result<Self, SqlConnectError> {
        if let Some(with_id) = sql_text::with_returning(sql, id_column) {
            // Tables without the identity column reject the rewrite; use the text as given.
            if let Ok(stmt) = conn.prepare(&with_id) {
                return Ok(Self::new(stmt, with_id, true, true));
            }
        }
        let stmt = conn
            .prepare(sql)
            .map_err(|e| SqlConnectError::from(e).with_sql(sql))?;
        Ok(Self::new(stmt, sql.to_owned(), sql_text::returns_rows(sql), false))
    }

    fn new(stmt: Statement<'c>, sql: String, yields_rows: bool, emulated_returning: bool) -> Self {
        Self {
            params: ParamSlots::new(stmt.parameter_count()),
            stmt,
            sql,
            cursor: RowCursor::default(),
            yields_rows,
            emulated_returning,
            last_rowid: 0,
            affected: RowsAffected::Unknown,
        }
    }

    fn run(&mut self) -> Result<(), duckdb::Error> {
        let values: Vec<Value> = self.params.values().iter().map(to_duck_value).collect();

        if !self.yields_rows {
            let n = self.stmt.execute(params_from_iter(values))?;
            self.affected = RowsAffected::Exact(u64::try_from(n).unwrap_or(u64::MAX));
            self.cursor.load(Vec::new(), Vec::new());
            return Ok(());
        }

        let mut fetched = Vec::new();
        let mut rows = self.stmt.query(params_from_iter(values))?;
        let width = rows.as_ref().map_or(0, Statement::column_count);
        while let Some(row) = rows.next()? {
            let mut row_values = Vec::with_capacity(width);
            for i in 0..width {
                row_values.push(from_duck_value(row.get::<_, Value>(i)?));
            }
            fetched.push(row_values);
        }
        drop(rows);
        let columns = self.stmt.column_names();

        if self.emulated_returning {
            self.last_rowid = fetched
                .first()
                .and_then(|row| row.first())
                .and_then(SqlValue::as_int)
                .and_then(|id| u64::try_from(id).ok())
                .unwrap_or(0);
            self.affected = RowsAffected::Exact(fetched.len() as u64);
            self.cursor.load(Vec::new(), Vec::new());
        } else {
            self.affected = if sql_text::is_query(&self.sql) {
                RowsAffected::Exact(0)
            } else {
                RowsAffected::Exact(fetched.len() as u64)
            };
            self.cursor.load(columns, fetched);
        }
        Ok(())
    }
}

impl RowSource for DuckStatement<'_> {
    fn column_count(&self) -> usize {
        self.cursor.column_count()
    }

    fn column_name(&self, index: usize) -> Result<String, SqlConnectError> {
        self.cursor.column_name(index)
    }

    fn column_value(&self, index: usize) -> Result<SqlValue, SqlConnectError> {
        self.cursor.value(index)
    }
}

impl SqlStatement for DuckStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn param_count(&self) -> usize {
        self.params.len()
    }

    fn bind_value(&mut self, index: usize, value: SqlValue) -> Result<(), SqlConnectError> {
        self.params.set(index, value)
    }

    fn exec(&mut self) -> Result<(), SqlConnectError> {
        trace!(sql = %self.sql, params = self.params.len(), "duckdb exec");
        self.cursor.clear_rows();
        self.last_rowid = 0;
        self.run()
            .map_err(|e| SqlConnectError::from(e).with_sql(&self.sql))
    }

    fn move_next(&mut self) -> bool {
        self.cursor.advance()
    }

    fn last_rowid(&self) -> u64 {
        self.last_rowid
    }

    fn rows_affected(&self) -> RowsAffected {
        self.affected
    }
}
