#![cfg(feature = "sqlite")]

mod common;

use common::{Person, people, sqlite_db, ts};
use sql_connect::prelude::*;

fn names(items: &[Person]) -> Vec<&str> {
    items.iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn conditions_select_the_expected_rows() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(12);
    items[2].name = "o'neil".to_string();
    conn.batch_save(&mut items, true).unwrap();

    let cases: Vec<(DbCondition, usize)> = vec![
        (DbCondition::default(), 12),
        (Field::new("age").ge(10), 2),
        (Field::new("age").lt(3), 3),
        (Field::new("name").eq("o'neil"), 1),
        (Field::new("name").like("p000%"), 9),
        (Field::new("age").in_list([1, 3, 5, 99]), 3),
        (Field::new("age").in_list(Vec::<i64>::new()), 0),
        (Field::new("age").not_in([0, 1]), 10),
        (Field::new("photo").is_null(), 12),
        (Field::new("photo").is_not_null(), 0),
        (Field::new("born").gt(ts("1990-01-10 00:00:00")), 2),
        (Field::new("age").ge(4) & Field::new("age").le(6), 3),
        (Field::new("age").eq(0) | Field::new("age").eq(11), 2),
        (DbCondition::raw("age % 2 = 0"), 6),
        (DbCondition::default().limit(4), 4),
    ];
    for (cond, expected) in cases {
        let label = cond.to_string();
        let mut loaded: Vec<Person> = Vec::new();
        conn.batch_load(&mut loaded, &cond).unwrap();
        assert_eq!(loaded.len(), expected, "{label}");
        assert_eq!(conn.count::<Person>(&cond).unwrap(), expected, "{label}");
    }
}

#[test]
fn ordering_and_limits() {
    let (_dir, conn) = sqlite_db();
    let mut items = people(6);
    conn.batch_save(&mut items, false).unwrap();

    let mut loaded: Vec<Person> = Vec::new();
    conn.batch_load(
        &mut loaded,
        Field::new("age").gt(0).desc("age").limit(3),
    )
    .unwrap();
    assert_eq!(names(&loaded), vec!["p0005", "p0004", "p0003"]);

    let mut first = Person::default();
    assert!(conn.load(&mut first, DbCondition::default().asc("name")).unwrap());
    assert_eq!(first.name, "p0000");

    let mut raw: Vec<Person> = Vec::new();
    conn.batch_load(&mut raw, "age IN (2, 4) ORDER BY age DESC").unwrap();
    assert_eq!(names(&raw), vec!["p0004", "p0002"]);
}

#[test]
fn bad_condition_is_a_sql_error() {
    let (_dir, conn) = sqlite_db();
    let mut loaded: Vec<Person> = Vec::new();
    let err = conn
        .batch_load(&mut loaded, Field::new("no_such_column").eq(1))
        .unwrap_err();
    assert!(matches!(err, SqlConnectError::Sql { .. }), "{err}");
    assert!(err.code().is_some());
}
