use std::cell::{Cell, RefCell};

use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, trace, warn};

use crate::connection::DbConnect;
use crate::error::SqlConnectError;
use crate::parameter::Parameter;
use crate::sql_text;
use crate::statement::SqlStatement;
use crate::types::{BackendKind, RowsAffected, SqlValue};

use super::config::{PostgresOptions, PostgresOptionsBuilder};
use super::statement::PostgresStatement;

/// A blocking session on a `PostgreSQL` server.
///
/// The wire protocol runs on a private current-thread runtime; every call
/// blocks on it. A closed session is reopened once and the failed call
/// retried once. Each reopen bumps a generation counter so statements
/// prepared on the old session can tell they are stale.
pub struct PostgresConnect {
    client: RefCell<Client>,
    opts: PostgresOptions,
    name: String,
    generation: Cell<u64>,
    in_tx: Cell<bool>,
    runtime: Runtime,
}

impl PostgresConnect {
    #[must_use]
    pub fn builder() -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::new()
    }

    /// Connect and run the optional `attach` SQL.
    ///
    /// # Errors
    ///
    /// `ConnectionError` when the runtime cannot start, the server refuses
    /// the session, or the `attach` SQL fails.
    pub fn open(opts: PostgresOptions) -> Result<Self, SqlConnectError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlConnectError::ConnectionError(format!("tokio runtime: {e}")))?;
        let client = connect(&runtime, &opts)?;
        let name = format!("{}@{}:{}/{}", opts.user, opts.host, opts.port, opts.dbname);
        debug!(db = %name, "postgres connection opened");
        Ok(Self {
            client: RefCell::new(client),
            opts,
            name,
            generation: Cell::new(0),
            in_tx: Cell::new(false),
            runtime,
        })
    }

    /// # Errors
    ///
    /// `ConfigError` for bad parameters, then as [`PostgresConnect::open`].
    pub fn from_params(param: &Parameter) -> Result<Self, SqlConnectError> {
        Self::open(PostgresOptions::from_params(param)?)
    }

    /// Close the session. Dropping does the same without reporting.
    ///
    /// # Errors
    ///
    /// Never at present; kept fallible to match the other backends.
    pub fn close(self) -> Result<(), SqlConnectError> {
        debug!(db = %self.name, "postgres connection closed");
        Ok(())
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub(super) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(super) fn client(&self) -> std::cell::Ref<'_, Client> {
        self.client.borrow()
    }

    /// Replace the session after the server closed it.
    pub(super) fn reconnect(&self) -> Result<(), SqlConnectError> {
        warn!(db = %self.name, "postgres session closed, reconnecting");
        let client = connect(&self.runtime, &self.opts)?;
        *self.client.borrow_mut() = client;
        self.generation.set(self.generation.get() + 1);
        // Whatever transaction was open died with the old session.
        self.in_tx.set(false);
        Ok(())
    }

    /// Whether a closed-session failure may be retried on a new session.
    pub(super) fn can_retry(&self) -> bool {
        !self.in_tx.get()
    }

    /// Run `op` against the live client, reconnecting and retrying once when
    /// the session turns out to be closed.
    fn call<T>(
        &self,
        mut op: impl FnMut(&Runtime, &Client) -> Result<T, tokio_postgres::Error>,
    ) -> Result<T, SqlConnectError> {
        let first = op(&self.runtime, &*self.client.borrow());
        match first {
            Err(e) if e.is_closed() => {
                let retry = self.can_retry();
                self.reconnect()?;
                if !retry {
                    return Err(SqlConnectError::Transient(format!(
                        "session closed inside a transaction: {e}"
                    )));
                }
                op(&self.runtime, &*self.client.borrow()).map_err(SqlConnectError::from)
            }
            other => other.map_err(SqlConnectError::from),
        }
    }
}

fn connect(runtime: &Runtime, opts: &PostgresOptions) -> Result<Client, SqlConnectError> {
    let cfg = opts.pg_config();
    let (client, connection) = runtime.block_on(cfg.connect(NoTls)).map_err(|e| {
        SqlConnectError::ConnectionError(format!(
            "failed to connect to {}:{}: {e}",
            opts.host, opts.port
        ))
    })?;
    runtime.spawn(async move {
        if let Err(e) = connection.await {
            warn!(error = %e, "postgres connection task ended");
        }
    });
    if let Some(attach) = &opts.attach {
        runtime
            .block_on(client.batch_execute(attach))
            .map_err(|e| SqlConnectError::ConnectionError(format!("attach failed: {e}")))?;
    }
    Ok(client)
}

impl DbConnect for PostgresConnect {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn db_name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> bool {
        self.call(|rt, client| rt.block_on(client.simple_query("SELECT 1")))
            .is_ok()
    }

    /// Single statements report an exact count; `;`-separated batches do not.
    fn exec(&self, sql: &str) -> Result<RowsAffected, SqlConnectError> {
        trace!(sql, "postgres exec");
        if sql_text::is_compound(sql) {
            self.call(|rt, client| rt.block_on(client.batch_execute(sql)))
                .map_err(|e| e.with_sql(sql))?;
            return Ok(RowsAffected::Unknown);
        }
        let n = self
            .call(|rt, client| rt.block_on(client.execute(sql, &[])))
            .map_err(|e| e.with_sql(sql))?;
        Ok(RowsAffected::Exact(n))
    }

    fn statement(&self, sql: &str) -> Result<Box<dyn SqlStatement + '_>, SqlConnectError> {
        Ok(Box::new(PostgresStatement::prepare(self, sql, "id")?))
    }

    fn transaction(&self) -> Result<(), SqlConnectError> {
        if self.in_tx.get() {
            return Err(SqlConnectError::TransactionError(
                "transaction already in progress".to_string(),
            ));
        }
        self.call(|rt, client| rt.block_on(client.batch_execute("BEGIN")))?;
        self.in_tx.set(true);
        Ok(())
    }

    fn commit(&self) -> Result<(), SqlConnectError> {
        if !self.in_tx.get() {
            return Err(SqlConnectError::TransactionError(
                "commit without an active transaction".to_string(),
            ));
        }
        let result = self.call(|rt, client| rt.block_on(client.batch_execute("COMMIT")));
        self.in_tx.set(false);
        result
    }

    fn rollback(&self) -> bool {
        if !self.in_tx.get() {
            return false;
        }
        self.in_tx.set(false);
        let client = self.client.borrow();
        match self.runtime.block_on(client.batch_execute("ROLLBACK")) {
            Ok(()) => true,
            Err(e) => {
                error!(db = %self.name, error = %e, "postgres rollback failed");
                false
            }
        }
    }

    fn in_transaction(&self) -> bool {
        self.in_tx.get()
    }

    fn table_exist(&self, name: &str) -> bool {
        self.call(|rt, client| {
            rt.block_on(client.query_one(
                "SELECT COUNT(1) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[&name],
            ))
        })
        .is_ok_and(|row| row.get::<_, i64>(0) > 0)
    }

    fn table_names(&self) -> Result<Vec<String>, SqlConnectError> {
        let rows = self.call(|rt, client| {
            rt.block_on(client.query(
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = current_schema() ORDER BY table_name",
                &[],
            ))
        })?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    /// Restart the sequence behind `<table>.id`, when there is one.
    fn reset_auto_increment(&self, table: &str) -> Result<(), SqlConnectError> {
        let row = self.call(|rt, client| {
            rt.block_on(client.query_one("SELECT pg_get_serial_sequence($1, 'id')", &[&table]))
        })?;
        let Some(sequence) = row.get::<_, Option<String>>(0) else {
            debug!(table, "no identity sequence to reset");
            return Ok(());
        };
        self.exec(&format!("ALTER SEQUENCE {sequence} RESTART WITH 1"))?;
        Ok(())
    }

    /// `VALUES` parameters carry no column types here, so the generic
    /// multi-row update would compare text against typed columns.
    fn bulk_update(
        &self,
        _table: &str,
        _id_column: &str,
        _columns: &[&str],
        _rows: &[Vec<SqlValue>],
    ) -> Result<(), SqlConnectError> {
        Err(SqlConnectError::Unimplemented(
            "postgres bulk update".to_string(),
        ))
    }
}
