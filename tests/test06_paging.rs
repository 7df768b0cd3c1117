#![cfg(feature = "sqlite")]

mod common;

use std::cell::Cell;

use common::{Person, people, sqlite_db};
use sql_connect::prelude::*;

/// Delegates to a real connection, counting page queries (the ones with an
/// `OFFSET`). With `broken` set, page queries fail to prepare.
struct PageCounter<'a> {
    inner: &'a SqliteConnect,
    page_queries: Cell<usize>,
    broken: Cell<bool>,
}

impl<'a> PageCounter<'a> {
    fn new(inner: &'a SqliteConnect) -> Self {
        Self {
            inner,
            page_queries: Cell::new(0),
            broken: Cell::new(false),
        }
    }
}

impl DbConnect for PageCounter<'_> {
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
        if sql.contains(" OFFSET ") {
            if self.broken.get() {
                return Err(SqlConnectError::Other("connection lost".to_string()));
            }
            self.page_queries.set(self.page_queries.get() + 1);
        }
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
}

#[test]
fn paged_access_matches_direct_offsets() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(23);
    conn.batch_save(&mut items, true).unwrap();

    for page_size in [1, 5, 23, 50] {
        let pages = conn
            .query::<Person>(DbCondition::default())
            .unwrap()
            .with_page_size(page_size);
        assert_eq!(pages.size(), 23);
        assert_eq!(pages.page_count(), 23usize.div_ceil(page_size));

        for i in 0..pages.size() {
            let mut direct: Vec<Person> = Vec::new();
            conn.batch_load_view(
                &mut direct,
                &format!("{} ORDER BY id LIMIT 1 OFFSET {i}", Person::select_sql()),
            )
            .unwrap();
            assert_eq!(pages.at(i).unwrap(), direct[0], "page size {page_size}, row {i}");
        }

        assert!(matches!(pages.at(23), Err(SqlConnectError::OutOfRange(_))));
        let sentinel = pages.get(23);
        assert!(!sentinel.valid());
    }
}

#[test]
fn conditions_and_ordering_carry_into_pages() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(30);
    conn.batch_save(&mut items, false).unwrap();

    let pages = conn
        .query::<Person>(Field::new("age").ge(10).desc("age"))
        .unwrap()
        .with_page_size(7);
    assert_eq!(pages.size(), 20);
    let ages: Vec<i32> = pages.iter().map(|p| p.age).collect();
    assert_eq!(ages, (10..30).rev().collect::<Vec<_>>());

    // A limited condition is paged within its limit.
    let limited = conn
        .query::<Person>(DbCondition::default().asc("id").limit(8))
        .unwrap()
        .with_page_size(3);
    assert_eq!(limited.size(), 8);
    let ids: Vec<u64> = (&limited).into_iter().map(|p| p.id).collect();
    let mut expected: Vec<u64> = items.iter().map(|p| p.id).collect();
    expected.sort_unstable();
    expected.truncate(8);
    assert_eq!(ids, expected);
    assert!(limited.at(8).is_err());
}

#[test]
fn empty_and_default_cursors() {
    let (_dir, conn) = sqlite_db();
    let pages = conn.query::<Person>(Field::new("name").eq("nobody")).unwrap();
    assert!(pages.is_empty());
    assert_eq!(pages.page_count(), 0);
    assert_eq!(pages.page_size(), DEFAULT_PAGE_SIZE);
    assert_eq!(pages.iter().count(), 0);
    assert!(pages.at(0).is_err());

    let detached: ResultPages<'_, Person> = ResultPages::default();
    assert_eq!(detached.size(), 0);
    assert!(!detached.get(0).valid());
}

#[test]
fn pages_work_over_dyn_connections() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(4);
    conn.batch_save(&mut items, false).unwrap();

    let dynamic: &dyn DbConnect = &conn;
    let pages = dynamic.query::<Person>("").unwrap().with_page_size(3);
    assert_eq!(pages.iter().count(), 4);
    assert_eq!(pages.get(3).name, "p0003");
}

#[test]
fn one_page_is_cached_and_each_miss_loads_once() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(12);
    conn.batch_save(&mut items, false).unwrap();

    let counter = PageCounter::new(&conn);
    let pages = counter
        .query::<Person>(DbCondition::default())
        .unwrap()
        .with_page_size(5);
    assert_eq!(counter.page_queries.get(), 0, "construction only counts");

    for i in 0..5 {
        assert_eq!(pages.at(i).unwrap().id, items[i].id);
    }
    assert_eq!(counter.page_queries.get(), 1);

    assert_eq!(pages.at(7).unwrap().id, items[7].id);
    assert_eq!(pages.at(9).unwrap().id, items[9].id);
    assert_eq!(counter.page_queries.get(), 2);

    // The second page replaced the first.
    assert_eq!(pages.at(0).unwrap().id, items[0].id);
    assert_eq!(counter.page_queries.get(), 3);

    // Out-of-range access never touches the backend.
    assert!(!pages.get(12).valid());
    assert_eq!(counter.page_queries.get(), 3);
}

#[test]
fn page_load_failures_are_not_hidden() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(8);
    conn.batch_save(&mut items, false).unwrap();

    let counter = PageCounter::new(&conn);
    let pages = counter
        .query::<Person>(DbCondition::default())
        .unwrap()
        .with_page_size(3);
    assert_eq!(pages.at(1).unwrap().name, "p0001");

    counter.broken.set(true);
    assert!(matches!(pages.at(4), Err(SqlConnectError::Other(_))));
    // Page 0 is still cached.
    assert_eq!(pages.get(2).name, "p0002");

    let mut iter = pages.iter();
    let seen: Vec<Person> = iter.by_ref().collect();
    assert_eq!(seen.len(), 3, "iteration stops at the first failed page");
    assert!(matches!(iter.failure(), Some(SqlConnectError::Other(_))));
    assert_eq!(iter.next(), None);

    counter.broken.set(false);
    assert_eq!(pages.iter().count(), 8);
}
