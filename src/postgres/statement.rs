use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Statement};
use tracing::trace;

use crate::error::SqlConnectError;
use crate::sql_text;
use crate::statement::{ParamSlots, RowCursor, RowSource, SqlStatement};
use crate::translation::{PlaceholderStyle, translate_placeholders};
use crate::types::{RowsAffected, SqlValue};

use super::PostgresConnect;
use super::params::postgres_extract_value;

/// Server-side prepared statement.
///
/// `?` placeholders are rewritten to `$N`. Inserts without `RETURNING` get
/// `RETURNING id` appended so [`SqlStatement::last_rowid`] can report the
/// identity; that synthetic row is not visible through `move_next`.
pub struct PostgresStatement<'c> {
    conn: &'c PostgresConnect,
    stmt: Statement,
    generation: u64,
    sql: String,
    params: ParamSlots,
    cursor: RowCursor,
    emulated_returning: bool,
    last_rowid: u64,
    affected: RowsAffected,
}

enum Outcome {
    Rows(Vec<Row>),
    Count(u64),
}

impl<'c> PostgresStatement<'c> {
    pub(super) fn prepare(
        conn: &'c PostgresConnect,
        sql: &str,
        id_column: &str,
    ) -> Result<Self, SqlConnectError> {
        let sql = translate_placeholders(sql, PlaceholderStyle::Postgres).into_owned();
        if let Some(with_id) = sql_text::with_returning(&sql, id_column) {
            // Tables without the identity column reject the rewrite; use the text as given.
            if let Ok(stmt) = prepare_on(conn, &with_id) {
                return Ok(Self::new(conn, stmt, with_id, true));
            }
        }
        let stmt = prepare_on(conn, &sql).map_err(|e| e.with_sql(&sql))?;
        Ok(Self::new(conn, stmt, sql, false))
    }

    fn new(
        conn: &'c PostgresConnect,
        stmt: Statement,
        sql: String,
        emulated_returning: bool,
    ) -> Self {
        let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let mut cursor = RowCursor::default();
        if !emulated_returning {
            cursor.load(columns, Vec::new());
        }
        Self {
            conn,
            params: ParamSlots::new(stmt.params().len()),
            generation: conn.generation(),
            stmt,
            sql,
            cursor,
            emulated_returning,
            last_rowid: 0,
            affected: RowsAffected::Unknown,
        }
    }

    fn run_once(&self) -> Result<Outcome, tokio_postgres::Error> {
        let refs: Vec<&(dyn ToSql + Sync)> = self
            .params
            .values()
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();
        let client = self.conn.client();
        if self.stmt.columns().is_empty() {
            self.conn
                .runtime()
                .block_on(client.execute(&self.stmt, &refs))
                .map(Outcome::Count)
        } else {
            self.conn
                .runtime()
                .block_on(client.query(&self.stmt, &refs))
                .map(Outcome::Rows)
        }
    }

    fn run(&mut self) -> Result<Outcome, SqlConnectError> {
        match self.run_once() {
            Err(e) if e.is_closed() => {
                let retry = self.conn.can_retry();
                self.conn.reconnect()?;
                if !retry {
                    return Err(SqlConnectError::Transient(format!(
                        "session closed inside a transaction: {e}"
                    )));
                }
                // Re-prepare on the new session, then retry once.
                self.stmt = prepare_on(self.conn, &self.sql)?;
                self.generation = self.conn.generation();
                self.run_once().map_err(SqlConnectError::from)
            }
            other => other.map_err(SqlConnectError::from),
        }
    }
}

fn prepare_on(conn: &PostgresConnect, sql: &str) -> Result<Statement, SqlConnectError> {
    let client = conn.client();
    conn.runtime()
        .block_on(client.prepare(sql))
        .map_err(SqlConnectError::from)
}

impl RowSource for PostgresStatement<'_> {
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

impl SqlStatement for PostgresStatement<'_> {
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
        if self.generation != self.conn.generation() {
            return Err(SqlConnectError::StaleStatement(self.sql.clone()));
        }
        trace!(sql = %self.sql, params = self.params.len(), "postgres exec");
        self.cursor.clear_rows();
        self.last_rowid = 0;

        match self.run().map_err(|e| e.with_sql(&self.sql))? {
            Outcome::Count(n) => {
                self.affected = RowsAffected::Exact(n);
            }
            Outcome::Rows(rows) if self.emulated_returning => {
                self.last_rowid = rows
                    .first()
                    .map(|row| postgres_extract_value(row, 0))
                    .transpose()?
                    .and_then(|v| v.as_int())
                    .and_then(|id| u64::try_from(id).ok())
                    .unwrap_or(0);
                self.affected = RowsAffected::Exact(rows.len() as u64);
            }
            Outcome::Rows(rows) => {
                let width = self.stmt.columns().len();
                let mut fetched = Vec::with_capacity(rows.len());
                for row in &rows {
                    let values = (0..width)
                        .map(|i| postgres_extract_value(row, i))
                        .collect::<Result<Vec<_>, _>>()?;
                    fetched.push(values);
                }
                self.affected = if sql_text::is_query(&self.sql) {
                    RowsAffected::Exact(0)
                } else {
                    RowsAffected::Exact(rows.len() as u64)
                };
                let columns = self.cursor_columns();
                self.cursor.load(columns, fetched);
            }
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

impl PostgresStatement<'_> {
    fn cursor_columns(&self) -> Vec<String> {
        self.stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }
}
