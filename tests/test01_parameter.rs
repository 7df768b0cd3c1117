use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use sql_connect::prelude::*;

#[test]
fn kind_mismatch_and_narrowing_are_reported() {
    let mut params = Parameter::new();
    params.set("x", 1i64).unwrap();
    let err = params.set("x", 1.0).unwrap_err();
    assert!(matches!(err, SqlConnectError::TypeMismatch(_)), "{err}");
    assert_eq!(params.get::<i64>("x").unwrap(), 1);

    params.set("big", 1i64 << 40).unwrap();
    let err = params.get::<i32>("big").unwrap_err();
    assert!(matches!(err, SqlConnectError::OutOfRange(_)), "{err}");
    assert_eq!(params.get::<i64>("big").unwrap(), 1 << 40);

    assert!(matches!(
        params.get::<String>("x"),
        Err(SqlConnectError::TypeMismatch(_))
    ));
    assert!(matches!(
        params.get::<i64>("missing"),
        Err(SqlConnectError::MissingParameter(name)) if name == "missing"
    ));
}

#[test]
fn bag_operations() {
    let born = NaiveDate::from_ymd_opt(2001, 2, 3)
        .unwrap()
        .and_hms_opt(4, 5, 6)
        .unwrap();
    let mut params = Parameter::new();
    assert!(params.is_empty());
    params.set("db", "market.db").unwrap();
    params.set("read_only", false).unwrap();
    params.set("ratio", 0.25).unwrap();
    params.set("since", born).unwrap();
    params.set("timeout", TimeDelta::seconds(3)).unwrap();

    assert_eq!(params.size(), 5);
    assert!(params.have("db"));
    assert!(!params.have("host"));
    assert_eq!(
        params.names(),
        vec!["db", "ratio", "read_only", "since", "timeout"]
    );
    assert_eq!(params.type_name("since").unwrap(), ParamKind::Datetime);
    assert_eq!(params.type_name("timeout").unwrap().name(), "duration");
    assert_eq!(params.get::<NaiveDateTime>("since").unwrap(), born);
    assert_eq!(params.try_get("port", 5432), 5432);
    assert_eq!(params.try_get("db", 0), 0);
    assert_eq!(params.value("ratio"), Some(&ParamValue::Double(0.25)));

    let copy = Parameter::from_json(&params.to_json().unwrap()).unwrap();
    assert_eq!(copy, params);

    params.clear();
    assert_eq!(params.size(), 0);
    assert_ne!(copy, params);
}

#[test]
fn display_is_stable() {
    let mut params = Parameter::new();
    params.set("port", 5432).unwrap();
    params.set("host", "localhost").unwrap();
    assert_eq!(
        params.to_string(),
        "params[host(string): localhost, port(int): 5432]"
    );
    assert_eq!(Parameter::new().to_string(), "params[]");
}
