use rusqlite::{Connection, Statement};
use tracing::trace;

use crate::error::SqlConnectError;
use crate::sql_text;
use crate::statement::{ParamSlots, RowCursor, RowSource, SqlStatement};
use crate::types::{RowsAffected, SqlValue};

use super::params::{from_sqlite_ref, to_sqlite_value};

/// Prepared `SQLite` statement. Rows are fetched into memory on `exec`.
pub struct SqliteStatement<'c> {
    conn: &'c Connection,
    stmt: Statement<'c>,
    sql: String,
    params: ParamSlots,
    cursor: RowCursor,
    insert: bool,
    last_rowid: u64,
    affected: RowsAffected,
}

impl<'c> SqliteStatement<'c> {
    pub(super) fn prepare(conn: &'c Connection, sql: &str) -> Result<Self, SqlConnectError> {
        let stmt = conn
            .prepare(sql)
            .map_err(|e| SqlConnectError::from(e).with_sql(sql))?;
        let columns = stmt
            .column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect();
        let mut cursor = RowCursor::default();
        cursor.load(columns, Vec::new());
        Ok(Self {
            conn,
            params: ParamSlots::new(stmt.parameter_count()),
            stmt,
            sql: sql.to_owned(),
            cursor,
            insert: sql_text::is_insert(sql),
            last_rowid: 0,
            affected: RowsAffected::Exact(0),
        })
    }

    fn run(&mut self) -> Result<(), rusqlite::Error> {
        for (i, value) in self.params.values().iter().enumerate() {
            self.stmt.raw_bind_parameter(i + 1, to_sqlite_value(value))?;
        }

        if self.stmt.column_count() == 0 {
            let n = self.stmt.raw_execute()?;
            self.affected = RowsAffected::Exact(u64::try_from(n).unwrap_or(u64::MAX));
            return Ok(());
        }

        let width = self.stmt.column_count();
        let mut fetched = Vec::new();
        let mut rows = self.stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sqlite_ref(row.get_ref(i)?));
            }
            fetched.push(values);
        }
        drop(rows);

        let columns = (0..width)
            .map(|i| self.stmt.column_name(i).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;
        self.cursor.load(columns, fetched);
        self.affected = if sql_text::is_query(&self.sql) {
            RowsAffected::Exact(0)
        } else {
            RowsAffected::Exact(u64::try_from(self.conn.changes()).unwrap_or(u64::MAX))
        };
        Ok(())
    }
}

impl RowSource for SqliteStatement<'_> {
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

impl SqlStatement for SqliteStatement<'_> {
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
        trace!(sql = %self.sql, params = self.params.len(), "sqlite exec");
        self.cursor.clear_rows();
        self.last_rowid = 0;
        self.run()
            .map_err(|e| SqlConnectError::from(e).with_sql(&self.sql))?;
        if self.insert {
            self.last_rowid = u64::try_from(self.conn.last_insert_rowid()).unwrap_or(0);
        }
        Ok(())
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
