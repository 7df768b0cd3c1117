#![cfg(feature = "postgres")]

mod common;

use std::time::Duration;

use common::{Person, people, ts};
use sql_connect::prelude::*;

#[test]
fn refused_connection_is_a_connection_error() {
    let result = PostgresConnect::builder()
        .host("127.0.0.1")
        .port(1)
        .connect_timeout(Duration::from_secs(2))
        .build();
    assert!(matches!(result, Err(SqlConnectError::ConnectionError(_))));

    let mut params = Parameter::new();
    params.set("port", 0).unwrap();
    assert!(matches!(
        PostgresConnect::from_params(&params),
        Err(SqlConnectError::ConfigError(_))
    ));
}

/// Live checks against a server named by `SQL_CONNECT_PG_HOST` (plus the
/// optional `_PORT`, `_USER`, `_PASSWORD` and `_DB` variables).
fn live() -> Option<PostgresConnect> {
    let host = std::env::var("SQL_CONNECT_PG_HOST").ok()?;
    let var = |suffix: &str, default: &str| {
        std::env::var(format!("SQL_CONNECT_PG_{suffix}")).unwrap_or_else(|_| default.to_string())
    };
    let conn = PostgresConnect::builder()
        .host(host)
        .port(var("PORT", "5432").parse().unwrap())
        .user(var("USER", "postgres"))
        .password(var("PASSWORD", ""))
        .dbname(var("DB", "postgres"))
        .build()
        .unwrap();
    conn.exec(
        "DROP TABLE IF EXISTS person;
         CREATE TABLE person (
            id BIGSERIAL PRIMARY KEY,
            name TEXT,
            age INTEGER,
            score DOUBLE PRECISION,
            born TIMESTAMP,
            photo BYTEA
         );",
    )
    .unwrap();
    Some(conn)
}

#[test]
fn live_round_trip_batches_and_paging() {
    let Some(conn) = live() else {
        eprintln!("SQL_CONNECT_PG_HOST not set, skipping");
        return;
    };
    assert!(conn.ping());
    assert!(conn.table_exist("person"));

    let mut ada = Person {
        name: "Ada".to_string(),
        age: 36,
        score: 2.5,
        born: ts("1815-12-10 08:30:15.250"),
        photo: Some(vec![1, 2, 3]),
        ..Default::default()
    };
    conn.save(&mut ada).unwrap();
    assert!(ada.valid());
    let mut loaded = Person::default();
    assert!(
        conn.load(&mut loaded, Field::new("id").eq(i64::try_from(ada.id).unwrap()))
            .unwrap()
    );
    assert_eq!(loaded, ada);

    let mut items = people(BATCH_BULK_THRESHOLD + 1);
    conn.batch_save(&mut items, true).unwrap();
    assert!(items.iter().all(|p| p.valid()));
    for p in &mut items {
        p.age += 1;
    }
    // No bulk update here; the row-by-row path runs.
    conn.batch_update(&items, true).unwrap();
    assert_eq!(conn.count::<Person>("").unwrap(), items.len() + 1);

    let pages = conn
        .query::<Person>(Field::new("name").like("p%"))
        .unwrap()
        .with_page_size(40);
    assert_eq!(pages.size(), items.len());
    assert_eq!(pages.at(0).unwrap().age, items[0].age);

    let result: Result<(), SqlConnectError> = conn.with_transaction(|c| {
        c.exec("DELETE FROM person")?;
        c.exec("SELECT * FROM missing_table")?;
        Ok(())
    });
    let err = result.unwrap_err();
    assert!(matches!(err, SqlConnectError::Sql { .. }), "{err}");
    assert_eq!(conn.count::<Person>("").unwrap(), items.len() + 1);

    conn.exec("DROP TABLE person").unwrap();
    conn.close().unwrap();
}
