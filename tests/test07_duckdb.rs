#![cfg(feature = "duckdb")]

mod common;

use std::panic::{AssertUnwindSafe, catch_unwind};

use common::{Person, people, ts};
use sql_connect::prelude::*;

const DUCK_DDL: &str = "
    CREATE SEQUENCE person_id_seq;
    CREATE TABLE person (
        id BIGINT PRIMARY KEY DEFAULT nextval('person_id_seq'),
        name VARCHAR,
        age INTEGER,
        score DOUBLE,
        born TIMESTAMP,
        photo BLOB
    );
";

fn duck_db() -> DuckConnect {
    let conn = DuckConnect::open_in_memory().unwrap();
    conn.exec(DUCK_DDL).unwrap();
    conn
}

fn count(conn: &DuckConnect) -> i64 {
    conn.query_number("SELECT COUNT(*) FROM person").unwrap()
}

#[test]
fn returning_identity_and_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let conn = duck_db();
    let mut ada = Person {
        name: "Ada".to_string(),
        age: 36,
        score: 1.25,
        born: ts("1815-12-10 08:30:15.250"),
        photo: Some(vec![9, 8, 7]),
        ..Default::default()
    };
    conn.save(&mut ada)?;
    assert_eq!(ada.id, 1);

    let mut second = Person::default();
    conn.save(&mut second)?;
    assert_eq!(second.id, 2);

    let mut loaded = Person::default();
    assert!(conn.load(&mut loaded, Field::new("id").eq(1))?);
    assert_eq!(loaded, ada);

    // The synthetic RETURNING row is not visible as a result row.
    let mut st = conn.statement("INSERT INTO person (name) VALUES (?)")?;
    st.bind(0, "quiet")?;
    st.exec()?;
    assert_eq!(st.last_rowid(), 3);
    assert!(!st.move_next());
    drop(st);

    // Caller-supplied RETURNING is left alone and its rows are visible.
    let mut st = conn.statement("INSERT INTO person (name) VALUES ('loud') RETURNING id, name")?;
    st.exec()?;
    assert!(st.move_next());
    assert_eq!(st.get::<String>(1)?, "loud");
    Ok(())
}

#[test]
fn bulk_paths_and_sequence_reset() {
    let conn = duck_db();
    let n = BATCH_BULK_THRESHOLD + 20;
    let mut items = people(n);
    conn.batch_save(&mut items, true).unwrap();
    assert_eq!(count(&conn), i64::try_from(n).unwrap());
    let ids: Vec<u64> = items.iter().map(|p| p.id).collect();
    assert_eq!(ids, (1..=u64::try_from(n).unwrap()).collect::<Vec<_>>());

    let mut loaded: Vec<Person> = Vec::new();
    conn.batch_load(&mut loaded, DbCondition::default().asc("id"))
        .unwrap();
    assert_eq!(loaded, items);

    for p in &mut items {
        p.score += 100.0;
    }
    conn.batch_update(&items, true).unwrap();
    let bumped = conn
        .query_number("SELECT COUNT(*) FROM person WHERE score >= 100")
        .unwrap();
    assert_eq!(bumped, i64::try_from(n).unwrap());

    // Restarting is best effort; a missing sequence is not an error.
    conn.exec("DELETE FROM person").unwrap();
    conn.reset_auto_increment("person").unwrap();
    conn.reset_auto_increment("no_such_table").unwrap();
    let mut fresh = people(1);
    conn.batch_save(&mut fresh, false).unwrap();
    assert!(fresh[0].valid());
    assert_eq!(count(&conn), 1);
}

#[test]
fn transactions_roll_back_without_savepoints() {
    let conn = duck_db();
    assert!(!conn.supports_savepoints());

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _tx = AutoTransaction::new(&conn).unwrap();
        let mut items = people(3);
        conn.batch_save(&mut items, false).unwrap();
        panic!("abort the scope");
    }));
    assert!(outcome.is_err());
    assert!(!conn.in_transaction());
    assert_eq!(count(&conn), 0);

    {
        let _tx = ManualTransaction::new(&conn).unwrap();
        conn.exec("INSERT INTO person (name) VALUES ('uncommitted')").unwrap();
    }
    assert_eq!(count(&conn), 0);

    // A batch inside an outer transaction writes straight through it.
    let mut tx = ManualTransaction::new(&conn).unwrap();
    let mut items = people(BATCH_BULK_THRESHOLD);
    conn.batch_save(&mut items, false).unwrap();
    tx.end().unwrap();
    assert_eq!(count(&conn), i64::try_from(BATCH_BULK_THRESHOLD).unwrap());
}

#[test]
fn catalog_and_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("market.duckdb");
    let mut params = Parameter::new();
    params.set("db", path.to_string_lossy().as_ref())?;
    let conn = DuckConnect::from_params(&params)?;
    conn.exec(DUCK_DDL)?;

    assert!(conn.ping());
    assert_eq!(conn.exec("UPDATE person SET age = 1")?, RowsAffected::Unknown);
    assert!(conn.table_exist("person"));
    assert!(!conn.table_exist("nobody"));
    assert_eq!(conn.table_names()?, vec!["person"]);
    let info = conn.table_info("person")?;
    assert_eq!(info[0], ("id".to_string(), "BIGINT".to_string()));
    assert_eq!(info.len(), 6);

    let export = dir.path().join("export");
    conn.export_database(&export)?;
    assert!(export.join("schema.sql").exists());
    conn.close()?;

    assert!(is_valid_duckdb_file(&path));
    let bogus = dir.path().join("bogus.duckdb");
    std::fs::write(&bogus, b"not a database")?;
    assert!(!is_valid_duckdb_file(&bogus));

    params.set("access_mode", "READ_ONLY")?;
    let read_only = DuckConnect::from_params(&params)?;
    assert!(read_only.exec("INSERT INTO person (name) VALUES ('x')").is_err());
    Ok(())
}

#[test]
fn registry_opens_duckdb() {
    let mut params = Parameter::new();
    params.set("db", ":memory:").unwrap();
    let conn = sql_connect::registry::open(BackendKind::Duckdb, &params).unwrap();
    assert_eq!(conn.backend(), BackendKind::Duckdb);
    assert_eq!(conn.query_number("SELECT 40 + 2").unwrap(), 42);
}
