//! Filter conditions for loads, paging and removal.
//!
//! ```rust
//! use sql_connect::prelude::*;
//!
//! let cond = (Field::new("age").ge(18) & Field::new("name").like("a%"))
//!     .order_by("name", SortDirection::Desc)
//!     .limit(10);
//! assert_eq!(
//!     cond.to_string(),
//!     "(age >= 18) AND (name LIKE 'a%') ORDER BY name DESC LIMIT 10"
//! );
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::types::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// A WHERE expression with optional ordering and limit.
///
/// Raw text (`"1=1 ORDER BY name"`) converts directly for callers that
/// already have SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbCondition {
    expr: String,
    order: Vec<(String, SortDirection)>,
    limit: Option<usize>,
}

impl DbCondition {
    #[must_use]
    pub fn raw(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order.push((column.to_owned(), direction));
        self
    }

    #[must_use]
    pub fn asc(self, column: &str) -> Self {
        self.order_by(column, SortDirection::Asc)
    }

    #[must_use]
    pub fn desc(self, column: &str) -> Self {
        self.order_by(column, SortDirection::Desc)
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expr.trim().is_empty() && self.order.is_empty() && self.limit.is_none()
    }

    #[must_use]
    pub fn has_limit(&self) -> bool {
        self.limit.is_some() || crate::sql_text::has_limit(&self.expr)
    }

    #[must_use]
    pub fn has_order(&self) -> bool {
        !self.order.is_empty() || crate::sql_text::has_order_by(&self.expr)
    }

    /// Text to append after a SELECT: `" WHERE ..."`, or empty.
    #[must_use]
    pub fn where_clause(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let rendered = self.to_string();
        if self.expr.trim().is_empty() {
            format!(" {rendered}")
        } else {
            format!(" WHERE {rendered}")
        }
    }

    fn combine(self, rhs: DbCondition, op: &str) -> DbCondition {
        match (self.expr.is_empty(), rhs.expr.is_empty()) {
            (true, _) => rhs,
            (_, true) => self,
            _ => DbCondition::raw(format!("({}) {op} ({})", self.expr, rhs.expr)),
        }
    }
}

impl fmt::Display for DbCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expr.trim())?;
        if !self.order.is_empty() {
            if !self.expr.trim().is_empty() {
                f.write_str(" ")?;
            }
            f.write_str("ORDER BY ")?;
            for (i, (col, dir)) in self.order.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{col} {dir}")?;
            }
        }
        if let Some(n) = self.limit {
            if !self.expr.trim().is_empty() || !self.order.is_empty() {
                f.write_str(" ")?;
            }
            write!(f, "LIMIT {n}")?;
        }
        Ok(())
    }
}

impl From<&str> for DbCondition {
    fn from(expr: &str) -> Self {
        DbCondition::raw(expr)
    }
}

impl From<String> for DbCondition {
    fn from(expr: String) -> Self {
        DbCondition::raw(expr)
    }
}

impl From<&DbCondition> for DbCondition {
    fn from(cond: &DbCondition) -> Self {
        cond.clone()
    }
}

impl BitAnd for DbCondition {
    type Output = DbCondition;

    fn bitand(self, rhs: DbCondition) -> DbCondition {
        self.combine(rhs, "AND")
    }
}

impl BitOr for DbCondition {
    type Output = DbCondition;

    fn bitor(self, rhs: DbCondition) -> DbCondition {
        self.combine(rhs, "OR")
    }
}

/// A column reference used to build comparisons.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
}

impl Field {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }

    fn compare(&self, op: &str, value: impl Into<SqlValue>) -> DbCondition {
        DbCondition::raw(format!("{} {op} {}", self.name, value.into().to_sql_literal()))
    }

    /// `= value`, or `IS NULL` for a null value.
    #[must_use]
    pub fn eq(&self, value: impl Into<SqlValue>) -> DbCondition {
        let value = value.into();
        if value.is_null() {
            self.is_null()
        } else {
            self.compare("=", value)
        }
    }

    #[must_use]
    pub fn ne(&self, value: impl Into<SqlValue>) -> DbCondition {
        let value = value.into();
        if value.is_null() {
            self.is_not_null()
        } else {
            self.compare("<>", value)
        }
    }

    #[must_use]
    pub fn gt(&self, value: impl Into<SqlValue>) -> DbCondition {
        self.compare(">", value)
    }

    #[must_use]
    pub fn ge(&self, value: impl Into<SqlValue>) -> DbCondition {
        self.compare(">=", value)
    }

    #[must_use]
    pub fn lt(&self, value: impl Into<SqlValue>) -> DbCondition {
        self.compare("<", value)
    }

    #[must_use]
    pub fn le(&self, value: impl Into<SqlValue>) -> DbCondition {
        self.compare("<=", value)
    }

    #[must_use]
    pub fn like(&self, pattern: &str) -> DbCondition {
        self.compare("LIKE", pattern)
    }

    #[must_use]
    pub fn is_null(&self) -> DbCondition {
        DbCondition::raw(format!("{} IS NULL", self.name))
    }

    #[must_use]
    pub fn is_not_null(&self) -> DbCondition {
        DbCondition::raw(format!("{} IS NOT NULL", self.name))
    }

    /// `IN (...)`; an empty list matches nothing.
    #[must_use]
    pub fn in_list<I, V>(&self, values: I) -> DbCondition
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.list("IN", values).unwrap_or_else(|| DbCondition::raw("1 = 0"))
    }

    /// `NOT IN (...)`; an empty list matches everything.
    #[must_use]
    pub fn not_in<I, V>(&self, values: I) -> DbCondition
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.list("NOT IN", values)
            .unwrap_or_else(|| DbCondition::raw("1 = 1"))
    }

    fn list<I, V>(&self, op: &str, values: I) -> Option<DbCondition>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let items: Vec<String> = values
            .into_iter()
            .map(|v| v.into().to_sql_literal())
            .collect();
        if items.is_empty() {
            None
        } else {
            Some(DbCondition::raw(format!(
                "{} {op} ({})",
                self.name,
                items.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_render_literals() {
        assert_eq!(Field::new("id").eq(37).to_string(), "id = 37");
        assert_eq!(
            Field::new("name").eq("o'neil").to_string(),
            "name = 'o''neil'"
        );
        assert_eq!(Field::new("x").eq(SqlValue::Null).to_string(), "x IS NULL");
        assert_eq!(
            Field::new("id").in_list([1, 2, 3]).to_string(),
            "id IN (1, 2, 3)"
        );
        assert_eq!(Field::new("id").in_list(Vec::<i64>::new()).to_string(), "1 = 0");
    }

    #[test]
    fn combinators_and_where_clause() {
        let cond = Field::new("id").eq(37) | Field::new("id").eq(1447);
        assert_eq!(cond.where_clause(), " WHERE (id = 37) OR (id = 1447)");
        assert_eq!(DbCondition::default().where_clause(), "");
        assert_eq!(
            DbCondition::default().asc("id").limit(5).where_clause(),
            " ORDER BY id ASC LIMIT 5"
        );
        let raw: DbCondition = "1=1 order by name DESC".into();
        assert!(raw.has_order());
        assert!(!raw.has_limit());
        assert_eq!(
            (DbCondition::default() & Field::new("a").gt(1)).to_string(),
            "a > 1"
        );
    }
}
