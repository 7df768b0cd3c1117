#![allow(dead_code)]

use chrono::NaiveDateTime;
use sql_connect::prelude::*;
#[cfg(feature = "sqlite")]
use tempfile::TempDir;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: u64,
    pub name: String,
    pub age: i32,
    pub score: f64,
    pub born: NaiveDateTime,
    pub photo: Option<Vec<u8>>,
}

sql_connect::impl_entity!(Person, "person", [name, age, score, born, photo]);

pub const PERSON_DDL: &str = "CREATE TABLE person (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    age INTEGER,
    score REAL,
    born TEXT,
    photo BLOB
)";

pub fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").unwrap()
}

pub fn person(i: usize) -> Person {
    Person {
        name: format!("p{i:04}"),
        age: i32::try_from(i % 90).unwrap(),
        score: i as f64 / 4.0,
        born: ts("1990-01-01 00:00:00") + chrono::Duration::days(i as i64),
        ..Default::default()
    }
}

pub fn people(n: usize) -> Vec<Person> {
    (0..n).map(person).collect()
}

#[cfg(feature = "sqlite")]
/// A file-backed database in a fresh temporary directory. Keep the
/// `TempDir` alive for as long as the connection is used.
pub fn sqlite_db() -> (TempDir, SqliteConnect) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let conn = SqliteConnect::builder(path.to_string_lossy().into_owned())
        .wal(true)
        .build()
        .unwrap();
    conn.exec(PERSON_DDL).unwrap();
    (dir, conn)
}

pub fn row_count(conn: &dyn DbConnect) -> i64 {
    conn.query_number("SELECT COUNT(*) FROM person").unwrap()
}
