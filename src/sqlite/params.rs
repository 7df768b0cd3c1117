use rusqlite::types::{Value, ValueRef};

use crate::types::{SqlValue, format_timestamp};

/// Convert one bound value into its `SQLite` storage class.
///
/// Booleans become 0/1 and timestamps become `%F %T%.f` text.
#[must_use]
pub fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) if f.is_nan() => Value::Null,
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(format_timestamp(dt)),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Read one column of a fetched row.
#[must_use]
pub fn from_sqlite_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn bool_and_timestamp_have_sqlite_storage_classes() {
        assert_eq!(to_sqlite_value(&SqlValue::Bool(true)), Value::Integer(1));
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            to_sqlite_value(&SqlValue::Timestamp(ts)),
            Value::Text("2024-01-02 03:04:05".into())
        );
        assert_eq!(to_sqlite_value(&SqlValue::Float(f64::NAN)), Value::Null);
    }
}
