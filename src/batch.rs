//! Save, update, load and remove collections of entities.
//!
//! Small batches run row by row through one reused prepared statement. From
//! [`BATCH_BULK_THRESHOLD`] rows on, the backend's bulk path is tried first;
//! it runs inside its own atomic scope, so when it fails nothing it wrote
//! survives and the row-by-row path takes over without duplicating rows.

use tracing::{debug, warn};

use crate::condition::DbCondition;
use crate::connection::DbConnect;
use crate::entity::{Entity, identity_value};
use crate::error::SqlConnectError;
use crate::statement::{RowSourceExt, SqlStatementExt};
use crate::transaction::AutoTransaction;
use crate::types::SqlValue;

/// Row count from which batch saves and updates take the bulk path.
pub const BATCH_BULK_THRESHOLD: usize = 100;

/// Upper bound on bound parameters per multi-row statement.
const MAX_PARAMS_PER_STATEMENT: usize = 900;

const BULK_SAVEPOINT: &str = "sql_connect_bulk";

/// Insert every item and assign the identities the backend produced.
///
/// With `autotrans`, the whole batch commits or rolls back as one unit.
///
/// # Errors
///
/// The first failure of the row-by-row path, or transaction errors. Bulk-path
/// failures are logged and recovered from.
pub fn batch_save<C, E>(conn: &C, items: &mut [E], autotrans: bool) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    if items.is_empty() {
        return Ok(());
    }
    debug!(
        table = E::TABLE,
        count = items.len(),
        bulk = items.len() >= BATCH_BULK_THRESHOLD,
        "batch save"
    );

    if items.len() >= BATCH_BULK_THRESHOLD
        && autotrans
        && !conn.supports_savepoints()
        && !conn.in_transaction()
    {
        // Without savepoints the bulk attempt owns the transaction.
        if try_bulk_insert(conn, items) {
            return Ok(());
        }
        return AutoTransaction::new(conn)?.scope(|c| save_each(c, items));
    }

    let mut run = |c: &C| -> Result<(), SqlConnectError> {
        if items.len() < BATCH_BULK_THRESHOLD || !try_bulk_insert(c, items) {
            save_each(c, items)?;
        }
        Ok(())
    };
    if autotrans {
        AutoTransaction::new(conn)?.scope(run)
    } else {
        run(conn)
    }
}

/// Update every item by identity.
///
/// # Errors
///
/// As [`batch_save`].
pub fn batch_update<C, E>(conn: &C, items: &[E], autotrans: bool) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    if items.is_empty() {
        return Ok(());
    }
    debug!(
        table = E::TABLE,
        count = items.len(),
        bulk = items.len() >= BATCH_BULK_THRESHOLD,
        "batch update"
    );

    if items.len() >= BATCH_BULK_THRESHOLD
        && autotrans
        && !conn.supports_savepoints()
        && !conn.in_transaction()
    {
        if try_bulk_update(conn, items) {
            return Ok(());
        }
        return AutoTransaction::new(conn)?.scope(|c| update_each(c, items));
    }

    let run = |c: &C| -> Result<(), SqlConnectError> {
        if items.len() < BATCH_BULK_THRESHOLD || !try_bulk_update(c, items) {
            update_each(c, items)?;
        }
        Ok(())
    };
    if autotrans {
        AutoTransaction::new(conn)?.scope(run)
    } else {
        run(conn)
    }
}

/// Append one entity per row selected by `cond`.
///
/// The rows are fetched in one round trip; if that fails the load is
/// re-issued through a row-by-row statement cursor. `container` only grows
/// when the whole load succeeds.
///
/// # Errors
///
/// The row-by-row path's error when both paths fail.
pub fn batch_load<C, E>(
    conn: &C,
    container: &mut Vec<E>,
    cond: &DbCondition,
) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let sql = format!("{}{}", E::select_sql(), cond.where_clause());
    batch_load_view(conn, container, &sql)
}

/// [`batch_load`] over an arbitrary SELECT.
///
/// # Errors
///
/// See [`batch_load`].
pub fn batch_load_view<C, E>(
    conn: &C,
    container: &mut Vec<E>,
    sql: &str,
) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let loaded = match load_from_result_set::<C, E>(conn, sql) {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, sql, "batch load failed, retrying row by row");
            load_row_by_row::<C, E>(conn, sql)?
        }
    };
    debug!(table = E::TABLE, count = loaded.len(), "batch load");
    container.extend(loaded);
    Ok(())
}

/// Delete every item by identity and reset their identities to 0.
///
/// # Errors
///
/// Prepare, execution or transaction errors.
pub fn batch_remove<C, E>(conn: &C, items: &mut [E], autotrans: bool) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    if items.is_empty() {
        return Ok(());
    }
    let run = |c: &C| -> Result<(), SqlConnectError> {
        let mut st = c.statement(&E::delete_sql())?;
        for item in items.iter().filter(|i| i.valid()) {
            st.bind_value(0, identity_value(item.id())?)?;
            st.exec()?;
        }
        Ok(())
    };
    if autotrans {
        AutoTransaction::new(conn)?.scope(run)?;
    } else {
        run(conn)?;
    }
    for item in items.iter_mut() {
        item.set_id(0);
    }
    Ok(())
}

fn save_each<C, E>(conn: &C, items: &mut [E]) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let mut st = conn.statement(&E::insert_sql())?;
    for item in items.iter_mut() {
        item.save(&mut *st)?;
        st.exec()?;
        item.set_id(st.last_rowid());
    }
    Ok(())
}

fn update_each<C, E>(conn: &C, items: &[E]) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let mut st = conn.statement(&E::update_sql())?;
    for item in items {
        item.update(&mut *st)?;
        st.exec()?;
    }
    Ok(())
}

fn try_bulk_insert<C, E>(conn: &C, items: &mut [E]) -> bool
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let attempt = atomic_scope(conn, || {
        let rows = items
            .iter()
            .map(E::field_values)
            .collect::<Result<Vec<_>, _>>()?;
        let ids = conn.bulk_insert(E::TABLE, E::ID_COLUMN, E::FIELDS, &rows)?;
        if ids.len() != rows.len() {
            return Err(SqlConnectError::StatementError(format!(
                "bulk insert returned {} identities for {} rows",
                ids.len(),
                rows.len()
            )));
        }
        Ok(ids)
    });
    match attempt {
        Ok(ids) => {
            for (item, id) in items.iter_mut().zip(ids) {
                item.set_id(id);
            }
            true
        }
        Err(err) => {
            report_bulk_failure(E::TABLE, "insert", &err);
            false
        }
    }
}

fn try_bulk_update<C, E>(conn: &C, items: &[E]) -> bool
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let attempt = atomic_scope(conn, || {
        let rows = items
            .iter()
            .map(|item| {
                let mut row = Vec::with_capacity(E::FIELDS.len() + 1);
                row.push(identity_value(item.id())?);
                row.extend(item.field_values()?);
                Ok(row)
            })
            .collect::<Result<Vec<_>, SqlConnectError>>()?;
        conn.bulk_update(E::TABLE, E::ID_COLUMN, E::FIELDS, &rows)
    });
    match attempt {
        Ok(()) => true,
        Err(err) => {
            report_bulk_failure(E::TABLE, "update", &err);
            false
        }
    }
}

fn report_bulk_failure(table: &str, op: &str, err: &SqlConnectError) {
    if matches!(err, SqlConnectError::Unimplemented(_)) {
        debug!(table, op, "no bulk path, using row-by-row");
    } else {
        warn!(table, op, error = %err, "bulk path failed, falling back to row-by-row");
    }
}

/// Run `f` so that a failure leaves no trace: inside a savepoint when the
/// backend has them, in an own transaction when none is active, and
/// unguarded otherwise.
fn atomic_scope<C, T, F>(conn: &C, f: F) -> Result<T, SqlConnectError>
where
    C: DbConnect + ?Sized,
    F: FnOnce() -> Result<T, SqlConnectError>,
{
    if conn.in_transaction() && conn.supports_savepoints() {
        conn.exec(&format!("SAVEPOINT {BULK_SAVEPOINT}"))?;
        return match f() {
            Ok(out) => {
                conn.exec(&format!("RELEASE SAVEPOINT {BULK_SAVEPOINT}"))?;
                Ok(out)
            }
            Err(err) => {
                if let Err(undo) = conn
                    .exec(&format!("ROLLBACK TO SAVEPOINT {BULK_SAVEPOINT}"))
                    .and_then(|_| conn.exec(&format!("RELEASE SAVEPOINT {BULK_SAVEPOINT}")))
                {
                    warn!(error = %undo, "failed to roll back bulk savepoint");
                }
                Err(err)
            }
        };
    }
    if !conn.in_transaction() {
        return AutoTransaction::new(conn)?.scope(|_| f());
    }
    f()
}

fn load_from_result_set<C, E>(conn: &C, sql: &str) -> Result<Vec<E>, SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let rs = conn.query_result_set(sql, &[])?;
    let mut out = Vec::with_capacity(rs.len());
    for row in &rs {
        let mut item = E::default();
        item.load(row)?;
        out.push(item);
    }
    Ok(out)
}

fn load_row_by_row<C, E>(conn: &C, sql: &str) -> Result<Vec<E>, SqlConnectError>
where
    C: DbConnect + ?Sized,
    E: Entity,
{
    let mut st = conn.statement(sql)?;
    st.exec()?;
    let mut out = Vec::new();
    while st.move_next() {
        let mut item = E::default();
        item.load(&*st)?;
        out.push(item);
    }
    Ok(out)
}

fn placeholders(width: usize) -> String {
    format!("({})", vec!["?"; width].join(", "))
}

fn rows_per_chunk(width: usize) -> usize {
    (MAX_PARAMS_PER_STATEMENT / width.max(1)).max(1)
}

/// Chunked `INSERT ... VALUES (...), (...) RETURNING id`.
pub(crate) fn multi_row_insert<C>(
    conn: &C,
    table: &str,
    id_column: &str,
    columns: &[&str],
    rows: &[Vec<SqlValue>],
) -> Result<Vec<u64>, SqlConnectError>
where
    C: DbConnect + ?Sized,
{
    let mut ids = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(rows_per_chunk(columns.len())) {
        let values = vec![placeholders(columns.len()); chunk.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES {values} RETURNING {id_column}",
            columns.join(", ")
        );
        let mut st = conn.statement(&sql)?;
        st.bind_all(&chunk.concat())?;
        st.exec()?;
        let mut chunk_ids = Vec::with_capacity(chunk.len());
        while st.move_next() {
            chunk_ids.push(st.get::<u64>(0)?);
        }
        // Identities grow with insertion order; RETURNING order is not guaranteed.
        chunk_ids.sort_unstable();
        ids.extend(chunk_ids);
    }
    Ok(ids)
}

/// Chunked `WITH v(...) AS (VALUES ...) UPDATE ... FROM v`.
pub(crate) fn multi_row_update<C>(
    conn: &C,
    table: &str,
    id_column: &str,
    columns: &[&str],
    rows: &[Vec<SqlValue>],
) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
{
    let width = columns.len() + 1;
    let sets = columns
        .iter()
        .map(|c| format!("{c} = v.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    for chunk in rows.chunks(rows_per_chunk(width)) {
        let values = vec![placeholders(width); chunk.len()].join(", ");
        let sql = format!(
            "WITH v({id_column}, {}) AS (VALUES {values}) \
             UPDATE {table} SET {sets} FROM v WHERE {table}.{id_column} = v.{id_column}",
            columns.join(", ")
        );
        let mut st = conn.statement(&sql)?;
        st.bind_all(&chunk.concat())?;
        st.exec()?;
    }
    Ok(())
}

/// Chunked `UPDATE ... FROM (VALUES ...) AS v(...)`, for engines that do
/// not accept a data-modifying statement after `WITH`.
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
pub(crate) fn values_alias_update<C>(
    conn: &C,
    table: &str,
    id_column: &str,
    columns: &[&str],
    rows: &[Vec<SqlValue>],
) -> Result<(), SqlConnectError>
where
    C: DbConnect + ?Sized,
{
    let width = columns.len() + 1;
    let sets = columns
        .iter()
        .map(|c| format!("{c} = v.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    for chunk in rows.chunks(rows_per_chunk(width)) {
        let values = vec![placeholders(width); chunk.len()].join(", ");
        let sql = format!(
            "UPDATE {table} SET {sets} FROM (VALUES {values}) AS v({id_column}, {}) \
             WHERE {table}.{id_column} = v.{id_column}",
            columns.join(", ")
        );
        let mut st = conn.statement(&sql)?;
        st.bind_all(&chunk.concat())?;
        st.exec()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_respects_parameter_budget() {
        assert_eq!(rows_per_chunk(3), 300);
        assert_eq!(rows_per_chunk(0), 900);
        assert_eq!(rows_per_chunk(2000), 1);
        assert_eq!(placeholders(3), "(?, ?, ?)");
    }
}
