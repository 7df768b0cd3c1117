//! The connection contract every backend implements.
//!
//! [`DbConnect`] is object safe, so hosts can hold a `Box<dyn DbConnect>`
//! chosen at runtime by [`registry::open`](crate::registry::open). The generic
//! conveniences (entity save/load, batches, paging, scoped transactions) live
//! on [`DbConnectExt`], which is implemented for every connection including
//! `dyn DbConnect`.

use tracing::info;

use crate::batch;
use crate::condition::DbCondition;
use crate::entity::{Entity, identity_value};
use crate::error::SqlConnectError;
use crate::paging::ResultPages;
use crate::results::ResultSet;
use crate::statement::{RowSourceExt, SqlStatement, SqlStatementExt};
use crate::transaction::AutoTransaction;
use crate::types::{BackendKind, RowsAffected, SqlValue, quote_literal};

/// Table holding one schema version per module for [`DbConnectExt::db_upgrade`].
pub const MODULE_VERSION_TABLE: &str = "module_version";

/// One live backend session.
///
/// All methods take `&self`; a connection is used by one thread at a time
/// and statements borrow it for their whole life.
pub trait DbConnect {
    fn backend(&self) -> BackendKind;

    /// Database file path or logical name the session was opened with.
    fn db_name(&self) -> &str;

    /// Run a trivial statement. Never fails; reports `false` instead.
    fn ping(&self) -> bool;

    /// Execute non-parameterized SQL, possibly several `;`-separated statements.
    ///
    /// # Errors
    ///
    /// `Sql` carrying the backend-native code.
    fn exec(&self, sql: &str) -> Result<RowsAffected, SqlConnectError>;

    /// Prepare `sql` against the live session.
    ///
    /// # Errors
    ///
    /// `Sql` when the text is invalid for the backend dialect.
    fn statement(&self, sql: &str) -> Result<Box<dyn SqlStatement + '_>, SqlConnectError>;

    /// Begin a top-level transaction.
    ///
    /// # Errors
    ///
    /// `TransactionError` when one is already active.
    fn transaction(&self) -> Result<(), SqlConnectError>;

    /// # Errors
    ///
    /// `TransactionError` without an active transaction, or the backend failure.
    fn commit(&self) -> Result<(), SqlConnectError>;

    /// Roll back the active transaction. Failures are logged, never returned.
    fn rollback(&self) -> bool;

    fn in_transaction(&self) -> bool;

    /// Whether `SAVEPOINT` can nest inside an active transaction.
    fn supports_savepoints(&self) -> bool {
        true
    }

    /// Best-effort table lookup; any failure reads as "does not exist".
    fn table_exist(&self, name: &str) -> bool;

    /// # Errors
    ///
    /// `Sql` if the catalog query fails.
    fn table_names(&self) -> Result<Vec<String>, SqlConnectError>;

    /// Restart identity numbering for `table`. A no-op where the backend has
    /// no such concept.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn reset_auto_increment(&self, table: &str) -> Result<(), SqlConnectError>;

    /// Run a query and fetch every row.
    ///
    /// # Errors
    ///
    /// Prepare, bind or execution errors.
    fn query_result_set(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqlConnectError> {
        let mut st = self.statement(sql)?;
        st.bind_all(params)?;
        st.exec()?;
        let mut rs = ResultSet::with_columns(st.column_names()?, 0);
        let width = st.column_count();
        while st.move_next() {
            let row = (0..width)
                .map(|i| st.column_value(i))
                .collect::<Result<Vec<_>, _>>()?;
            rs.add_row_values(row);
        }
        Ok(rs)
    }

    /// Insert many rows at once and return their identities in row order.
    ///
    /// The default issues chunked multi-row `INSERT ... RETURNING` statements.
    ///
    /// # Errors
    ///
    /// Any backend failure; `Unimplemented` where there is no bulk path.
    fn bulk_insert(
        &self,
        table: &str,
        id_column: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<u64>, SqlConnectError> {
        batch::multi_row_insert(self, table, id_column, columns, rows)
    }

    /// Update many rows at once. Each row holds the identity first, then the
    /// values of `columns`.
    ///
    /// # Errors
    ///
    /// Any backend failure; `Unimplemented` where there is no bulk path.
    fn bulk_update(
        &self,
        table: &str,
        id_column: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<(), SqlConnectError> {
        batch::multi_row_update(self, table, id_column, columns, rows)
    }
}

/// Generic conveniences over any [`DbConnect`].
pub trait DbConnectExt: DbConnect {
    /// First column of the first row as an integer.
    ///
    /// # Errors
    ///
    /// Query errors, or `StatementError` when the query returns no rows.
    fn query_number(&self, sql: &str) -> Result<i64, SqlConnectError> {
        let mut st = self.statement(sql)?;
        st.exec()?;
        if !st.move_next() {
            return Err(SqlConnectError::StatementError(format!(
                "query returned no rows: {sql}"
            )));
        }
        st.get::<i64>(0)
    }

    /// Like [`query_number`](Self::query_number), but an empty result or a
    /// NULL value yields `default`.
    ///
    /// # Errors
    ///
    /// Query or conversion errors.
    fn query_number_or(&self, sql: &str, default: i64) -> Result<i64, SqlConnectError> {
        let mut st = self.statement(sql)?;
        st.exec()?;
        if !st.move_next() {
            return Ok(default);
        }
        Ok(st.get::<Option<i64>>(0)?.unwrap_or(default))
    }

    /// Insert `item` when it has no identity yet, otherwise update it.
    ///
    /// # Errors
    ///
    /// Prepare, bind or execution errors.
    fn save<E: Entity>(&self, item: &mut E) -> Result<(), SqlConnectError> {
        if item.valid() {
            return self.update(item);
        }
        let mut st = self.statement(&E::insert_sql())?;
        item.save(&mut *st)?;
        st.exec()?;
        item.set_id(st.last_rowid());
        Ok(())
    }

    /// # Errors
    ///
    /// Prepare, bind or execution errors.
    fn update<E: Entity>(&self, item: &E) -> Result<(), SqlConnectError> {
        let mut st = self.statement(&E::update_sql())?;
        item.update(&mut *st)?;
        st.exec()
    }

    /// Load the first row matching `cond` into `item`. Returns `false` and
    /// leaves `item` untouched when nothing matches.
    ///
    /// # Errors
    ///
    /// Query or conversion errors.
    fn load<E: Entity>(
        &self,
        item: &mut E,
        cond: impl Into<DbCondition>,
    ) -> Result<bool, SqlConnectError> {
        let cond = cond.into();
        let sql = format!("{}{}", E::select_sql(), cond.where_clause());
        let mut st = self.statement(&sql)?;
        st.exec()?;
        if !st.move_next() {
            return Ok(false);
        }
        let mut loaded = E::default();
        loaded.load(&*st)?;
        *item = loaded;
        Ok(true)
    }

    /// Delete `item` by identity and mark it unsaved.
    ///
    /// # Errors
    ///
    /// Prepare or execution errors.
    fn remove<E: Entity>(&self, item: &mut E) -> Result<(), SqlConnectError> {
        if !item.valid() {
            return Ok(());
        }
        let mut st = self.statement(&E::delete_sql())?;
        st.bind_value(0, identity_value(item.id())?)?;
        st.exec()?;
        item.set_id(0);
        Ok(())
    }

    /// Number of rows `cond` selects for `E`.
    ///
    /// # Errors
    ///
    /// Query errors.
    fn count<E: Entity>(&self, cond: impl Into<DbCondition>) -> Result<usize, SqlConnectError> {
        let cond = cond.into();
        let sql = if cond.is_empty() {
            E::count_sql()
        } else {
            format!(
                "SELECT COUNT(1) FROM ({}{}) AS q",
                E::select_sql(),
                cond.where_clause()
            )
        };
        let n = self.query_number(&sql)?;
        usize::try_from(n).map_err(|_| SqlConnectError::OutOfRange(format!("row count {n}")))
    }

    /// See [`batch::batch_save`].
    ///
    /// # Errors
    ///
    /// See [`batch::batch_save`].
    fn batch_save<E: Entity>(
        &self,
        items: &mut [E],
        autotrans: bool,
    ) -> Result<(), SqlConnectError> {
        batch::batch_save(self, items, autotrans)
    }

    /// See [`batch::batch_update`].
    ///
    /// # Errors
    ///
    /// See [`batch::batch_update`].
    fn batch_update<E: Entity>(&self, items: &[E], autotrans: bool) -> Result<(), SqlConnectError> {
        batch::batch_update(self, items, autotrans)
    }

    /// See [`batch::batch_load`].
    ///
    /// # Errors
    ///
    /// See [`batch::batch_load`].
    fn batch_load<E: Entity>(
        &self,
        container: &mut Vec<E>,
        cond: impl Into<DbCondition>,
    ) -> Result<(), SqlConnectError> {
        batch::batch_load(self, container, &cond.into())
    }

    /// Load entities from an arbitrary SELECT whose columns follow
    /// [`Entity::select_sql`] order.
    ///
    /// # Errors
    ///
    /// See [`batch::batch_load_view`].
    fn batch_load_view<E: Entity>(
        &self,
        container: &mut Vec<E>,
        sql: &str,
    ) -> Result<(), SqlConnectError> {
        batch::batch_load_view(self, container, sql)
    }

    /// # Errors
    ///
    /// See [`batch::batch_remove`].
    fn batch_remove<E: Entity>(
        &self,
        items: &mut [E],
        autotrans: bool,
    ) -> Result<(), SqlConnectError> {
        batch::batch_remove(self, items, autotrans)
    }

    /// Paged random-access view over the rows `cond` selects.
    ///
    /// # Errors
    ///
    /// The counting query's errors.
    fn query<E: Entity>(
        &self,
        cond: impl Into<DbCondition>,
    ) -> Result<ResultPages<'_, E, Self>, SqlConnectError> {
        ResultPages::new(self, cond.into())
    }

    /// Bring the schema of `module` up to date.
    ///
    /// Versions live in the `module_version` table, created on first use. A
    /// module seen for the first time runs `create_script` (when given) and
    /// starts at version 1. `scripts[i]` then upgrades to version
    /// `start_version + i` and runs only when that is newer than the stored
    /// version. Each step commits together with its version bump.
    ///
    /// # Errors
    ///
    /// The failing script's error; earlier steps stay committed.
    fn db_upgrade(
        &self,
        module: &str,
        scripts: &[&str],
        start_version: i64,
        create_script: Option<&str>,
    ) -> Result<(), SqlConnectError> {
        if !self.table_exist(MODULE_VERSION_TABLE) {
            self.exec(&format!(
                "CREATE TABLE {MODULE_VERSION_TABLE} \
                 (module VARCHAR(64) PRIMARY KEY, version INTEGER NOT NULL)"
            ))?;
        }
        let module_lit = quote_literal(module);
        let mut version = self.query_number_or(
            &format!("SELECT version FROM {MODULE_VERSION_TABLE} WHERE module = {module_lit}"),
            0,
        )?;
        if version == 0 {
            self.with_transaction(|c| {
                if let Some(create) = create_script {
                    c.exec(create)?;
                }
                c.exec(&format!(
                    "INSERT INTO {MODULE_VERSION_TABLE} (module, version) VALUES ({module_lit}, 1)"
                ))
            })?;
            version = 1;
            info!(module, version, "module schema created");
        }
        for (step, script) in (start_version..).zip(scripts) {
            if step <= version {
                continue;
            }
            self.with_transaction(|c| {
                c.exec(script)?;
                c.exec(&format!(
                    "UPDATE {MODULE_VERSION_TABLE} SET version = {step} WHERE module = {module_lit}"
                ))
            })?;
            version = step;
            info!(module, version, "module schema upgraded");
        }
        Ok(())
    }

    /// Run `f` inside an auto-committing transaction. An `Err` from `f`, or a
    /// panic, rolls back.
    ///
    /// # Errors
    ///
    /// `f`'s error, or begin/commit failures.
    fn with_transaction<T, F>(&self, f: F) -> Result<T, SqlConnectError>
    where
        F: FnOnce(&Self) -> Result<T, SqlConnectError>,
    {
        AutoTransaction::new(self)?.scope(f)
    }
}

impl<C: DbConnect + ?Sized> DbConnectExt for C {}
