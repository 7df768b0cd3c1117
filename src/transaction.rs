//! Scope guards tying a transaction to a lexical block.
//!
//! [`AutoTransaction`] begins on construction and commits when it goes out of
//! scope normally; a panic unwinding through it rolls back instead. Code that
//! reports failures through `Result` should use [`AutoTransaction::scope`] (or
//! [`DbConnectExt::with_transaction`](crate::connection::DbConnectExt::with_transaction)),
//! which rolls back on `Err`.
//!
//! [`ManualTransaction`] also begins on construction, but commits only on
//! [`ManualTransaction::end`]. Dropping it without `end` rolls back, so a
//! forgotten `end` never commits partial work.

use tracing::{debug, error};

use crate::connection::DbConnect;
use crate::error::SqlConnectError;

/// Lifecycle of one guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Begun,
    Committed,
    RolledBack,
}

fn completed(state: TxState) -> SqlConnectError {
    SqlConnectError::TransactionError(format!("transaction already completed ({state:?})"))
}

/// Auto-committing transaction guard.
///
/// ```rust,no_run
/// use sql_connect::prelude::*;
///
/// # fn demo(conn: &dyn DbConnect) -> Result<(), SqlConnectError> {
/// let rows = conn.with_transaction(|c| {
///     c.exec("INSERT INTO t (a) VALUES (1)")?;
///     c.exec("INSERT INTO t (a) VALUES (2)")
/// })?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
pub struct AutoTransaction<'c, C: DbConnect + ?Sized> {
    conn: &'c C,
    state: TxState,
}

impl<'c, C: DbConnect + ?Sized> AutoTransaction<'c, C> {
    /// Begin a transaction on `conn`.
    ///
    /// # Errors
    ///
    /// `TransactionError` if `conn` already has an active transaction, or the
    /// backend's begin failure.
    pub fn new(conn: &'c C) -> Result<Self, SqlConnectError> {
        conn.transaction()?;
        debug!(db = conn.db_name(), "auto transaction begun");
        Ok(Self {
            conn,
            state: TxState::Begun,
        })
    }

    /// The guarded connection.
    pub fn connect(&self) -> &'c C {
        self.conn
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Commit now instead of at scope exit.
    ///
    /// # Errors
    ///
    /// The backend's commit failure. The guard is terminal either way.
    pub fn commit(mut self) -> Result<(), SqlConnectError> {
        self.finish_commit()
    }

    /// Roll back now. Never fails; returns whether the backend accepted it.
    pub fn rollback(mut self) -> bool {
        self.finish_rollback()
    }

    /// Run `f` in this transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// # Errors
    ///
    /// `f`'s error, or the commit failure.
    pub fn scope<T, F>(mut self, f: F) -> Result<T, SqlConnectError>
    where
        F: FnOnce(&'c C) -> Result<T, SqlConnectError>,
    {
        match f(self.conn) {
            Ok(out) => {
                self.finish_commit()?;
                Ok(out)
            }
            Err(err) => {
                self.finish_rollback();
                Err(err)
            }
        }
    }

    fn finish_commit(&mut self) -> Result<(), SqlConnectError> {
        if self.state != TxState::Begun {
            return Err(completed(self.state));
        }
        match self.conn.commit() {
            Ok(()) => {
                self.state = TxState::Committed;
                Ok(())
            }
            Err(err) => {
                // A failed commit leaves the backend transaction open.
                self.finish_rollback();
                Err(err)
            }
        }
    }

    fn finish_rollback(&mut self) -> bool {
        if self.state != TxState::Begun {
            return false;
        }
        self.state = TxState::RolledBack;
        self.conn.rollback()
    }
}

impl<C: DbConnect + ?Sized> Drop for AutoTransaction<'_, C> {
    fn drop(&mut self) {
        if self.state != TxState::Begun {
            return;
        }
        if std::thread::panicking() {
            debug!(db = self.conn.db_name(), "unwinding, rolling back auto transaction");
            self.finish_rollback();
        } else if let Err(err) = self.finish_commit() {
            error!(db = self.conn.db_name(), error = %err, "auto transaction commit failed");
        }
    }
}

/// Transaction guard that commits only on an explicit [`end`](Self::end).
///
/// ```rust,no_run
/// use sql_connect::prelude::*;
///
/// # fn demo(conn: &dyn DbConnect) -> Result<(), SqlConnectError> {
/// let mut tx = ManualTransaction::new(conn)?;
/// conn.exec("INSERT INTO t (a) VALUES (1)")?;
/// tx.end()?;
/// # Ok(())
/// # }
/// ```
pub struct ManualTransaction<'c, C: DbConnect + ?Sized> {
    conn: &'c C,
    state: TxState,
}

impl<'c, C: DbConnect + ?Sized> ManualTransaction<'c, C> {
    /// Begin a transaction on `conn`.
    ///
    /// # Errors
    ///
    /// `TransactionError` if `conn` already has an active transaction, or the
    /// backend's begin failure.
    pub fn new(conn: &'c C) -> Result<Self, SqlConnectError> {
        conn.transaction()?;
        debug!(db = conn.db_name(), "manual transaction begun");
        Ok(Self {
            conn,
            state: TxState::Begun,
        })
    }

    pub fn connect(&self) -> &'c C {
        self.conn
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Make sure a transaction is open: a no-op while begun, otherwise a new
    /// transaction after an earlier `end` or `rollback`.
    ///
    /// # Errors
    ///
    /// The backend's begin failure.
    pub fn begin(&mut self) -> Result<(), SqlConnectError> {
        if self.state == TxState::Begun {
            return Ok(());
        }
        self.conn.transaction()?;
        self.state = TxState::Begun;
        Ok(())
    }

    /// Commit the work done since the transaction began.
    ///
    /// # Errors
    ///
    /// `TransactionError` unless begun, or the backend's commit failure.
    pub fn end(&mut self) -> Result<(), SqlConnectError> {
        if self.state != TxState::Begun {
            return Err(completed(self.state));
        }
        match self.conn.commit() {
            Ok(()) => {
                self.state = TxState::Committed;
                Ok(())
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }

    /// Discard the work done since the transaction began. Never fails.
    pub fn rollback(&mut self) -> bool {
        if self.state != TxState::Begun {
            return false;
        }
        self.state = TxState::RolledBack;
        self.conn.rollback()
    }
}

impl<C: DbConnect + ?Sized> Drop for ManualTransaction<'_, C> {
    fn drop(&mut self) {
        if self.state == TxState::Begun {
            debug!(
                db = self.conn.db_name(),
                "manual transaction dropped without end, rolling back"
            );
            self.rollback();
        }
    }
}
