use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use duckdb::types::{TimeUnit, Value};

use crate::types::SqlValue;

/// Convert one bound value into a `DuckDB` value.
#[must_use]
pub fn to_duck_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(i) => Value::BigInt(*i),
        SqlValue::Float(f) if f.is_nan() => Value::Null,
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Boolean(*b),
        SqlValue::Timestamp(dt) => {
            Value::Timestamp(TimeUnit::Microsecond, dt.and_utc().timestamp_micros())
        }
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

fn timestamp(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Second => DateTime::from_timestamp(raw, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(raw),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(raw)),
    };
    dt.map(|d| d.naive_utc())
}

/// Map a fetched `DuckDB` value onto the shared value model.
///
/// Wide integers that do not fit `i64`, decimals and nested types are
/// rendered as text so nothing is silently truncated.
#[must_use]
pub fn from_duck_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Bool(b),
        Value::TinyInt(i) => SqlValue::Int(i64::from(i)),
        Value::SmallInt(i) => SqlValue::Int(i64::from(i)),
        Value::Int(i) => SqlValue::Int(i64::from(i)),
        Value::BigInt(i) => SqlValue::Int(i),
        Value::UTinyInt(i) => SqlValue::Int(i64::from(i)),
        Value::USmallInt(i) => SqlValue::Int(i64::from(i)),
        Value::UInt(i) => SqlValue::Int(i64::from(i)),
        Value::UBigInt(i) => {
            i64::try_from(i).map_or_else(|_| SqlValue::Text(i.to_string()), SqlValue::Int)
        }
        Value::HugeInt(i) => {
            i64::try_from(i).map_or_else(|_| SqlValue::Text(i.to_string()), SqlValue::Int)
        }
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(f) => SqlValue::Float(f),
        Value::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .map_or(SqlValue::Text(text), SqlValue::Float)
        }
        Value::Timestamp(unit, raw) => {
            timestamp(unit, raw).map_or(SqlValue::Int(raw), SqlValue::Timestamp)
        }
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(TimeDelta::days(i64::from(days))))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(SqlValue::Int(i64::from(days)), SqlValue::Timestamp),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(bytes) => SqlValue::Blob(bytes),
        other => SqlValue::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_micros() {
        let ts = NaiveDate::from_ymd_opt(2023, 5, 6)
            .unwrap()
            .and_hms_micro_opt(7, 8, 9, 123_456)
            .unwrap();
        let back = from_duck_value(to_duck_value(&SqlValue::Timestamp(ts)));
        assert_eq!(back, SqlValue::Timestamp(ts));
    }

    #[test]
    fn oversized_unsigned_becomes_text() {
        assert_eq!(
            from_duck_value(Value::UBigInt(u64::MAX)),
            SqlValue::Text(u64::MAX.to_string())
        );
        assert_eq!(from_duck_value(Value::Date32(1)), {
            let d = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
            SqlValue::Timestamp(d.and_hms_opt(0, 0, 0).unwrap())
        });
    }
}
