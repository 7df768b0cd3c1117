#![cfg(feature = "sqlite")]

mod common;

use std::cell::Cell;
use std::collections::HashSet;

use common::{Person, people, row_count, sqlite_db};
use sql_connect::prelude::*;

/// Delegates to a real connection while counting bulk calls. With `fail`
/// set, each bulk call writes half of its rows and then reports an error.
struct BulkCounter<'a> {
    inner: &'a SqliteConnect,
    fail: bool,
    bulk_calls: Cell<usize>,
}

impl<'a> BulkCounter<'a> {
    fn new(inner: &'a SqliteConnect, fail: bool) -> Self {
        Self {
            inner,
            fail,
            bulk_calls: Cell::new(0),
        }
    }
}

impl DbConnect for BulkCounter<'_> {
    fn backend(&self) -> BackendKind {
        self.inner.backend()
    }

    fn db_name(&self) -> &str {
        self.inner.db_name()
    }

    fn ping(&self) -> bool {
        self.inner.ping()
    }

    fn exec(&self, sql: &str) -> Result<RowsAffected, SqlConnectError> {
        self.inner.exec(sql)
    }

    fn statement(&self, sql: &str) -> Result<Box<dyn SqlStatement + '_>, SqlConnectError> {
        self.inner.statement(sql)
    }

    fn transaction(&self) -> Result<(), SqlConnectError> {
        self.inner.transaction()
    }

    fn commit(&self) -> Result<(), SqlConnectError> {
        self.inner.commit()
    }

    fn rollback(&self) -> bool {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn table_exist(&self, name: &str) -> bool {
        self.inner.table_exist(name)
    }

    fn table_names(&self) -> Result<Vec<String>, SqlConnectError> {
        self.inner.table_names()
    }

    fn reset_auto_increment(&self, table: &str) -> Result<(), SqlConnectError> {
        self.inner.reset_auto_increment(table)
    }

    fn bulk_insert(
        &self,
        table: &str,
        id_column: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<u64>, SqlConnectError> {
        self.bulk_calls.set(self.bulk_calls.get() + 1);
        if !self.fail {
            return self.inner.bulk_insert(table, id_column, columns, rows);
        }
        self.inner
            .bulk_insert(table, id_column, columns, &rows[..rows.len() / 2])?;
        Err(SqlConnectError::Other("injected bulk insert failure".to_string()))
    }

    fn bulk_update(
        &self,
        table: &str,
        id_column: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<(), SqlConnectError> {
        self.bulk_calls.set(self.bulk_calls.get() + 1);
        if !self.fail {
            return self.inner.bulk_update(table, id_column, columns, rows);
        }
        self.inner
            .bulk_update(table, id_column, columns, &rows[..rows.len() / 2])?;
        Err(SqlConnectError::Other("injected bulk update failure".to_string()))
    }
}

fn assert_distinct_ids(items: &[Person]) {
    let ids: HashSet<u64> = items.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), items.len());
    assert!(!ids.contains(&0));
}

#[test]
fn threshold_boundary_persists_every_row() {
    for (n, expected_bulk_calls) in [
        (BATCH_BULK_THRESHOLD - 1, 0),
        (BATCH_BULK_THRESHOLD, 1),
        (BATCH_BULK_THRESHOLD + 1, 1),
    ] {
        for autotrans in [true, false] {
            let (_dir, conn) = sqlite_db();
            let counter = BulkCounter::new(&conn, false);
            let mut items = people(n);
            counter.batch_save(&mut items, autotrans).unwrap();

            assert_eq!(counter.bulk_calls.get(), expected_bulk_calls, "n = {n}");
            assert_eq!(row_count(&conn), i64::try_from(n).unwrap(), "n = {n}");
            assert_distinct_ids(&items);
            assert!(!conn.in_transaction());

            let mut loaded: Vec<Person> = Vec::new();
            conn.batch_load(&mut loaded, DbCondition::default().asc("id"))
                .unwrap();
            let mut saved = items.clone();
            saved.sort_by_key(|p| p.id);
            assert_eq!(loaded, saved, "n = {n}");
        }
    }
}

#[test]
fn failed_bulk_insert_leaves_nothing_behind() {
    for n in [BATCH_BULK_THRESHOLD, BATCH_BULK_THRESHOLD + 57] {
        for autotrans in [true, false] {
            let (_dir, conn) = sqlite_db();
            let counter = BulkCounter::new(&conn, true);
            let mut items = people(n);
            counter.batch_save(&mut items, autotrans).unwrap();

            assert_eq!(counter.bulk_calls.get(), 1);
            assert_eq!(row_count(&conn), i64::try_from(n).unwrap());
            assert_distinct_ids(&items);

            let names: HashSet<String> = conn
                .query_result_set("SELECT name FROM person", &[])
                .unwrap()
                .iter()
                .filter_map(|row| row.get_by_index(0).and_then(|v| v.as_text()).map(str::to_owned))
                .collect();
            assert_eq!(names.len(), n, "no duplicated rows");
        }
    }
}

#[test]
fn failed_bulk_insert_inside_outer_transaction_uses_savepoint() {
    let (_dir, conn) = sqlite_db();
    let counter = BulkCounter::new(&conn, true);
    let mut tx = ManualTransaction::new(&counter).unwrap();
    let mut items = people(BATCH_BULK_THRESHOLD * 2);
    counter.batch_save(&mut items, false).unwrap();
    assert!(counter.in_transaction());
    tx.end().unwrap();
    assert_eq!(row_count(&conn), i64::try_from(items.len()).unwrap());
}

#[test]
fn batch_update_both_paths() {
    for fail in [false, true] {
        let (_dir, conn) = sqlite_db();
        let mut items = people(BATCH_BULK_THRESHOLD + 1);
        conn.batch_save(&mut items, true).unwrap();

        for p in &mut items {
            p.name = format!("{}-renamed", p.name);
            p.age += 1;
        }
        let counter = BulkCounter::new(&conn, fail);
        counter.batch_update(&items, true).unwrap();
        assert_eq!(counter.bulk_calls.get(), 1);

        let renamed = conn
            .query_number("SELECT COUNT(*) FROM person WHERE name LIKE '%-renamed'")
            .unwrap();
        assert_eq!(renamed, i64::try_from(items.len()).unwrap(), "fail = {fail}");
        let twice = conn
            .query_number("SELECT COUNT(*) FROM person WHERE name LIKE '%-renamed-renamed'")
            .unwrap();
        assert_eq!(twice, 0);

        let mut first = Person::default();
        conn.load(&mut first, Field::new("id").eq(i64::try_from(items[0].id).unwrap()))
            .unwrap();
        assert_eq!(first, items[0]);
    }
}

#[test]
fn small_update_and_remove() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(10);
    conn.batch_save(&mut items, true).unwrap();
    items[3].score = -1.5;
    conn.batch_update(&items[..5], false).unwrap();
    assert_eq!(
        conn.query_number("SELECT COUNT(*) FROM person WHERE score < 0").unwrap(),
        1
    );

    conn.batch_remove(&mut items[..4], true).unwrap();
    assert!(items[..4].iter().all(|p| !p.valid()));
    assert!(items[4..].iter().all(|p| p.valid()));
    assert_eq!(row_count(&conn), 6);

    // Unsaved entries are skipped.
    conn.batch_remove(&mut items[..4], false).unwrap();
    assert_eq!(row_count(&conn), 6);
}

#[test]
fn load_view_and_empty_batches() {
    let (_dir, conn) = sqlite_db();
    let mut none: Vec<Person> = Vec::new();
    conn.batch_save(&mut none, true).unwrap();
    conn.batch_update(&none, true).unwrap();
    assert!(!conn.in_transaction());

    let mut items = people(20);
    conn.batch_save(&mut items, false).unwrap();

    let mut older: Vec<Person> = vec![Person::default()];
    conn.batch_load_view(
        &mut older,
        "SELECT id, name, age, score, born, photo FROM person WHERE age >= 15 ORDER BY age DESC",
    )
    .unwrap();
    // Existing contents are kept; loaded rows are appended.
    assert_eq!(older.len(), 6);
    assert_eq!(older[1].age, 19);
    assert_eq!(older[5].age, 15);

    let mut unchanged = vec![Person::default()];
    assert!(
        conn.batch_load_view(&mut unchanged, "SELECT nope FROM person")
            .is_err()
    );
    assert_eq!(unchanged.len(), 1);
}
