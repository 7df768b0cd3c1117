//! Named, type-tagged configuration values.
//!
//! A [`Parameter`] bag feeds connection construction (`db`, `host`,
//! `access_mode`, ...) and any other user-level settings. Each key carries one
//! value from a closed set of kinds, and once a key exists its kind is fixed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::SqlConnectError;

/// One stored parameter value.
///
/// Integral inputs are stored as `Int(i64)` and floating inputs as `Double(f64)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
    Double(f64),
    #[serde(rename = "string")]
    Str(String),
    Datetime(NaiveDateTime),
    Duration(#[serde(with = "duration_micros")] TimeDelta),
}

/// Storage tag of a [`ParamValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Int,
    Bool,
    Double,
    Str,
    Datetime,
    Duration,
}

impl ParamKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
            ParamKind::Double => "double",
            ParamKind::Str => "string",
            ParamKind::Datetime => "datetime",
            ParamKind::Duration => "duration",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ParamValue {
    #[must_use]
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Double(_) => ParamKind::Double,
            ParamValue::Str(_) => ParamKind::Str,
            ParamValue::Datetime(_) => ParamKind::Datetime,
            ParamValue::Duration(_) => ParamKind::Duration,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Double(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
            ParamValue::Datetime(v) => write!(f, "{v}"),
            ParamValue::Duration(v) => write!(f, "{v}"),
        }
    }
}

mod duration_micros {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer, ser::Error};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        match value.num_microseconds() {
            Some(us) => serializer.serialize_i64(us),
            None => Err(S::Error::custom("duration overflows microseconds")),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let us = i64::deserialize(deserializer)?;
        Ok(TimeDelta::microseconds(us))
    }
}

/// Types accepted by [`Parameter::set`].
///
/// Only the closed set of kinds implements this, so unsupported value types
/// are rejected when the call is compiled.
pub trait IntoParam {
    fn into_param(self) -> ParamValue;
}

/// Types readable through [`Parameter::get`].
pub trait FromParam: Sized {
    /// # Errors
    ///
    /// `TypeMismatch` when the stored kind cannot become `Self`, `OutOfRange`
    /// when a narrowing conversion would lose the value.
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError>;
}

fn param_mismatch(name: &str, value: &ParamValue, wanted: &str) -> SqlConnectError {
    SqlConnectError::TypeMismatch(format!(
        "parameter '{name}' is {}, requested {wanted}",
        value.kind()
    ))
}

macro_rules! int_param {
    ($($ty:ty),*) => {$(
        impl IntoParam for $ty {
            fn into_param(self) -> ParamValue {
                ParamValue::Int(i64::from(self))
            }
        }

        impl FromParam for $ty {
            fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
                match value {
                    ParamValue::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                        SqlConnectError::OutOfRange(format!(
                            "parameter '{name}' = {v} does not fit in {}",
                            stringify!($ty)
                        ))
                    }),
                    other => Err(param_mismatch(name, other, stringify!($ty))),
                }
            }
        }
    )*};
}

int_param!(i8, i16, i32, i64, u8, u16, u32);

impl IntoParam for f64 {
    fn into_param(self) -> ParamValue {
        ParamValue::Double(self)
    }
}

impl IntoParam for f32 {
    fn into_param(self) -> ParamValue {
        ParamValue::Double(f64::from(self))
    }
}

impl FromParam for f64 {
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
        match value {
            ParamValue::Double(v) => Ok(*v),
            other => Err(param_mismatch(name, other, "f64")),
        }
    }
}

impl FromParam for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
        let wide = f64::from_param(value, name)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(SqlConnectError::OutOfRange(format!(
                "parameter '{name}' = {wide} does not fit in f32"
            )));
        }
        Ok(wide as f32)
    }
}

impl IntoParam for bool {
    fn into_param(self) -> ParamValue {
        ParamValue::Bool(self)
    }
}

impl FromParam for bool {
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
        match value {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(param_mismatch(name, other, "bool")),
        }
    }
}

impl IntoParam for String {
    fn into_param(self) -> ParamValue {
        ParamValue::Str(self)
    }
}

impl IntoParam for &str {
    fn into_param(self) -> ParamValue {
        ParamValue::Str(self.to_owned())
    }
}

impl FromParam for String {
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
        match value {
            ParamValue::Str(v) => Ok(v.clone()),
            other => Err(param_mismatch(name, other, "string")),
        }
    }
}

impl IntoParam for NaiveDateTime {
    fn into_param(self) -> ParamValue {
        ParamValue::Datetime(self)
    }
}

impl FromParam for NaiveDateTime {
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
        match value {
            ParamValue::Datetime(v) => Ok(*v),
            other => Err(param_mismatch(name, other, "datetime")),
        }
    }
}

impl IntoParam for TimeDelta {
    fn into_param(self) -> ParamValue {
        ParamValue::Duration(self)
    }
}

impl FromParam for TimeDelta {
    fn from_param(value: &ParamValue, name: &str) -> Result<Self, SqlConnectError> {
        match value {
            ParamValue::Duration(v) => Ok(*v),
            other => Err(param_mismatch(name, other, "duration")),
        }
    }
}

/// A named parameter bag.
///
/// ```rust
/// use sql_connect::prelude::*;
///
/// let mut params = Parameter::new();
/// params.set("db", ":memory:").unwrap();
/// params.set("port", 5432).unwrap();
/// assert!(params.set("port", 1.5).is_err());
/// assert_eq!(params.get::<i32>("port").unwrap(), 5432);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameter {
    params: BTreeMap<String, ParamValue>,
}

impl Parameter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `SqlConnectError::TypeMismatch` if `name` already holds a value
    /// of a different kind. The bag is left unchanged in that case.
    pub fn set<T: IntoParam>(&mut self, name: &str, value: T) -> Result<(), SqlConnectError> {
        let value = value.into_param();
        if let Some(existing) = self.params.get_mut(name) {
            if existing.kind() != value.kind() {
                return Err(SqlConnectError::TypeMismatch(format!(
                    "parameter '{name}' is {}, cannot set {}",
                    existing.kind(),
                    value.kind()
                )));
            }
            *existing = value;
        } else {
            self.params.insert(name.to_owned(), value);
        }
        Ok(())
    }

    /// Read `name` as `T`.
    ///
    /// # Errors
    ///
    /// `MissingParameter` if the key is absent, otherwise see [`FromParam`].
    pub fn get<T: FromParam>(&self, name: &str) -> Result<T, SqlConnectError> {
        let value = self
            .params
            .get(name)
            .ok_or_else(|| SqlConnectError::MissingParameter(name.to_owned()))?;
        T::from_param(value, name)
    }

    /// Read `name`, falling back to `default` when it is absent or unreadable as `T`.
    pub fn try_get<T: FromParam>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    #[must_use]
    pub fn have(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// Keys in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    /// The stored kind of `name`.
    ///
    /// # Errors
    ///
    /// `MissingParameter` if the key is absent.
    pub fn type_name(&self, name: &str) -> Result<ParamKind, SqlConnectError> {
        self.params
            .get(name)
            .map(ParamValue::kind)
            .ok_or_else(|| SqlConnectError::MissingParameter(name.to_owned()))
    }

    /// Raw access to a stored value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// # Errors
    ///
    /// Returns `SqlConnectError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, SqlConnectError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns `SqlConnectError::Json` if `text` is not a serialized bag.
    pub fn from_json(text: &str) -> Result<Self, SqlConnectError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("params[")?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}({}): {value}", value.kind())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_fixed_after_first_set() {
        let mut p = Parameter::new();
        p.set("x", 1i64).unwrap();
        p.set("x", 7i32).unwrap();
        assert!(matches!(p.set("x", 1.0), Err(SqlConnectError::TypeMismatch(_))));
        assert_eq!(p.get::<i64>("x").unwrap(), 7);
    }

    #[test]
    fn display_lists_sorted_keys() {
        let mut p = Parameter::new();
        p.set("b", "x").unwrap();
        p.set("a", true).unwrap();
        assert_eq!(p.to_string(), "params[a(bool): true, b(string): x]");
    }

    #[test]
    fn duration_serializes_as_micros() {
        let mut p = Parameter::new();
        p.set("timeout", TimeDelta::milliseconds(1500)).unwrap();
        let text = p.to_json().unwrap();
        assert_eq!(text, r#"{"timeout":{"type":"duration","value":1500000}}"#);
        assert_eq!(Parameter::from_json(&text).unwrap(), p);
    }
}
