//! Conversions between Rust field types and [`SqlValue`].
//!
//! Reads follow the null-sentinel rules: a SQL NULL read into a plain scalar
//! yields that type's "null" value (`0`, `NaN`, `""`, `false`,
//! [`NULL_DATETIME`]) and binding one of those sentinels where it is
//! unambiguous (`NaN`, [`NULL_DATETIME`], `None`) writes SQL NULL back. Blobs
//! have no sentinel, so reading NULL into `Vec<u8>` is an error.

use chrono::NaiveDateTime;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::SqlConnectError;
use crate::types::SqlValue;

/// Datetime sentinel standing in for SQL NULL in non-optional fields.
pub const NULL_DATETIME: NaiveDateTime = NaiveDateTime::MAX;

/// Convert a Rust value into a bindable [`SqlValue`].
pub trait ToSqlValue {
    /// # Errors
    ///
    /// Returns `SqlConnectError::OutOfRange` when the value does not fit the
    /// 64-bit signed integer storage class, or `Json` when serialization fails.
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError>;
}

/// Convert a column value back into a Rust value.
pub trait FromSqlValue: Sized {
    /// `column` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch`, `OutOfRange` or `NullBlob` as described in the
    /// module docs.
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError>;
}

fn mismatch(expected: &str, value: &SqlValue, column: usize) -> SqlConnectError {
    SqlConnectError::TypeMismatch(format!(
        "column {column}: expected {expected}, found {}",
        value.kind_name()
    ))
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(self.clone())
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue, _column: usize) -> Result<Self, SqlConnectError> {
        Ok(value)
    }
}

impl<T: ToSqlValue + ?Sized> ToSqlValue for &T {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        (**self).to_sql_value()
    }
}

macro_rules! int_conversions {
    ($($ty:ty),*) => {$(
        impl ToSqlValue for $ty {
            fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
                Ok(SqlValue::Int(i64::from(*self)))
            }
        }

        impl FromSqlValue for $ty {
            fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
                match value {
                    SqlValue::Null => Ok(0),
                    SqlValue::Int(v) => <$ty>::try_from(v).map_err(|_| {
                        SqlConnectError::OutOfRange(format!(
                            "column {column}: {v} does not fit in {}",
                            stringify!($ty)
                        ))
                    }),
                    SqlValue::Bool(b) => Ok(<$ty>::from(b)),
                    other => Err(mismatch(stringify!($ty), &other, column)),
                }
            }
        }
    )*};
}

int_conversions!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for u64 {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        i64::try_from(*self)
            .map(SqlValue::Int)
            .map_err(|_| SqlConnectError::OutOfRange(format!("{self} does not fit in i64")))
    }
}

impl FromSqlValue for u64 {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Null => Ok(0),
            SqlValue::Int(v) => u64::try_from(v).map_err(|_| {
                SqlConnectError::OutOfRange(format!("column {column}: {v} is negative"))
            }),
            SqlValue::Bool(b) => Ok(u64::from(b)),
            other => Err(mismatch("u64", &other, column)),
        }
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        if self.is_nan() {
            Ok(SqlValue::Null)
        } else {
            Ok(SqlValue::Float(*self))
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Null => Ok(f64::NAN),
            other => other.as_float().ok_or_else(|| mismatch("f64", &other, column)),
        }
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        f64::from(*self).to_sql_value()
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        let wide = f64::from_sql_value(value, column)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(SqlConnectError::OutOfRange(format!(
                "column {column}: {wide} does not fit in f32"
            )));
        }
        Ok(wide as f32)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(SqlValue::Bool(*self))
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(v) => Ok(v != 0),
            other => Err(mismatch("bool", &other, column)),
        }
    }
}

impl ToSqlValue for str {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(SqlValue::Text(self.to_owned()))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(SqlValue::Text(self.clone()))
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Null => Ok(String::new()),
            SqlValue::Text(s) => Ok(s),
            other => Err(mismatch("text", &other, column)),
        }
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        if *self == NULL_DATETIME {
            Ok(SqlValue::Null)
        } else {
            Ok(SqlValue::Timestamp(*self))
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Null => Ok(NULL_DATETIME),
            other => other
                .as_timestamp()
                .ok_or_else(|| mismatch("datetime", &other, column)),
        }
    }
}

impl ToSqlValue for [u8] {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(SqlValue::Blob(self.to_vec()))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(SqlValue::Blob(self.clone()))
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Null => Err(SqlConnectError::NullBlob(column)),
            SqlValue::Blob(bytes) => Ok(bytes),
            other => Err(mismatch("blob", &other, column)),
        }
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        match self {
            Some(v) => v.to_sql_value(),
            None => Ok(SqlValue::Null),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value, column).map(Some)
        }
    }
}

/// A structured field stored as JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> ToSqlValue for Json<T> {
    fn to_sql_value(&self) -> Result<SqlValue, SqlConnectError> {
        Ok(SqlValue::Text(serde_json::to_string(&self.0)?))
    }
}

impl<T: DeserializeOwned> FromSqlValue for Json<T> {
    fn from_sql_value(value: SqlValue, column: usize) -> Result<Self, SqlConnectError> {
        match value {
            SqlValue::Text(s) => Ok(Json(serde_json::from_str(&s)?)),
            other => Err(mismatch("json text", &other, column)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reads_yield_sentinels() {
        assert_eq!(i32::from_sql_value(SqlValue::Null, 0).unwrap(), 0);
        assert!(f64::from_sql_value(SqlValue::Null, 0).unwrap().is_nan());
        assert_eq!(String::from_sql_value(SqlValue::Null, 0).unwrap(), "");
        assert_eq!(
            NaiveDateTime::from_sql_value(SqlValue::Null, 0).unwrap(),
            NULL_DATETIME
        );
        assert_eq!(Option::<i64>::from_sql_value(SqlValue::Null, 0).unwrap(), None);
        assert!(matches!(
            Vec::<u8>::from_sql_value(SqlValue::Null, 3),
            Err(SqlConnectError::NullBlob(3))
        ));
    }

    #[test]
    fn narrowing_is_checked() {
        let big = SqlValue::Int(1 << 40);
        assert!(matches!(
            i32::from_sql_value(big.clone(), 0),
            Err(SqlConnectError::OutOfRange(_))
        ));
        assert_eq!(i64::from_sql_value(big, 0).unwrap(), 1 << 40);
        assert!(matches!(
            u32::from_sql_value(SqlValue::Int(-1), 0),
            Err(SqlConnectError::OutOfRange(_))
        ));
        assert!(matches!(
            f32::from_sql_value(SqlValue::Float(1e300), 0),
            Err(SqlConnectError::OutOfRange(_))
        ));
        assert!(matches!(
            i64::from_sql_value(SqlValue::Text("1".into()), 0),
            Err(SqlConnectError::TypeMismatch(_))
        ));
    }

    #[test]
    fn sentinels_bind_null_but_zero_does_not() {
        assert_eq!(f64::NAN.to_sql_value().unwrap(), SqlValue::Null);
        assert_eq!(NULL_DATETIME.to_sql_value().unwrap(), SqlValue::Null);
        assert_eq!(0i32.to_sql_value().unwrap(), SqlValue::Int(0));
        assert_eq!("".to_sql_value().unwrap(), SqlValue::Text(String::new()));
        assert!(matches!(
            u64::MAX.to_sql_value(),
            Err(SqlConnectError::OutOfRange(_))
        ));
    }

    #[test]
    fn json_column() {
        let v = Json(vec![1, 2, 3]);
        let stored = v.to_sql_value().unwrap();
        assert_eq!(stored, SqlValue::Text("[1,2,3]".into()));
        let back: Json<Vec<i32>> = Json::from_sql_value(stored, 0).unwrap();
        assert_eq!(back, v);
    }
}
