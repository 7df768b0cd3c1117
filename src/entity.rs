//! Mapping between record types and table rows.
//!
//! A mapped type has a numeric identity (`0` until it is persisted) plus a
//! fixed list of fields. [`impl_entity!`](crate::impl_entity) generates the
//! per-type parts; the SQL text and the binders are provided here.
//!
//! ```rust
//! use sql_connect::prelude::*;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Person {
//!     id: u64,
//!     name: String,
//!     age: i32,
//! }
//!
//! sql_connect::impl_entity!(Person, "person", [name, age]);
//!
//! assert_eq!(Person::insert_sql(), "INSERT INTO person (name, age) VALUES (?, ?)");
//! assert_eq!(Person::update_sql(), "UPDATE person SET name = ?, age = ? WHERE id = ?");
//! assert_eq!(Person::select_sql(), "SELECT id, name, age FROM person");
//! assert!(!Person::default().valid());
//! ```

use crate::error::SqlConnectError;
use crate::statement::{RowSource, SqlStatement};
use crate::types::SqlValue;

pub trait Entity: Default + Clone {
    /// Table (or view) the type maps to.
    const TABLE: &'static str;
    /// Mapped columns, identity excluded, in bind order.
    const FIELDS: &'static [&'static str];
    const ID_COLUMN: &'static str = "id";

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Whether the record has been persisted.
    fn valid(&self) -> bool {
        self.id() != 0
    }

    /// Field values in [`Entity::FIELDS`] order.
    ///
    /// # Errors
    ///
    /// Conversion errors from the field types.
    fn field_values(&self) -> Result<Vec<SqlValue>, SqlConnectError>;

    /// Read the identity and then every field from the current row, in
    /// [`Entity::select_sql`] column order.
    ///
    /// # Errors
    ///
    /// Column access or conversion errors.
    fn load<R: RowSource + ?Sized>(&mut self, row: &R) -> Result<(), SqlConnectError>;

    /// Insert text. The identity is assigned by the backend and never bound.
    fn insert_sql() -> String {
        let marks = vec!["?"; Self::FIELDS.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({marks})",
            Self::TABLE,
            Self::FIELDS.join(", ")
        )
    }

    fn update_sql() -> String {
        let sets = Self::FIELDS
            .iter()
            .map(|f| format!("{f} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {sets} WHERE {} = ?",
            Self::TABLE,
            Self::ID_COLUMN
        )
    }

    /// Select text; the identity is always the first column.
    fn select_sql() -> String {
        format!(
            "SELECT {}, {} FROM {}",
            Self::ID_COLUMN,
            Self::FIELDS.join(", "),
            Self::TABLE
        )
    }

    fn delete_sql() -> String {
        format!("DELETE FROM {} WHERE {} = ?", Self::TABLE, Self::ID_COLUMN)
    }

    fn count_sql() -> String {
        format!("SELECT COUNT(1) FROM ({}) AS q", Self::select_sql())
    }

    /// Bind the fields for [`Entity::insert_sql`].
    ///
    /// # Errors
    ///
    /// Conversion or bind errors.
    fn save<S: SqlStatement + ?Sized>(&self, st: &mut S) -> Result<(), SqlConnectError> {
        for (i, value) in self.field_values()?.into_iter().enumerate() {
            st.bind_value(i, value)?;
        }
        Ok(())
    }

    /// Bind the fields and then the identity for [`Entity::update_sql`].
    ///
    /// # Errors
    ///
    /// Conversion or bind errors.
    fn update<S: SqlStatement + ?Sized>(&self, st: &mut S) -> Result<(), SqlConnectError> {
        let values = self.field_values()?;
        let id_pos = values.len();
        for (i, value) in values.into_iter().enumerate() {
            st.bind_value(i, value)?;
        }
        st.bind_value(id_pos, identity_value(self.id())?)
    }
}

pub(crate) fn identity_value(id: u64) -> Result<SqlValue, SqlConnectError> {
    i64::try_from(id)
        .map(SqlValue::Int)
        .map_err(|_| SqlConnectError::OutOfRange(format!("identity {id} does not fit in i64")))
}

/// Implement [`Entity`] for a struct with an `id: u64` field.
///
/// The listed fields must implement `ToSqlValue` and `FromSqlValue`.
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty, $table:expr, [$($field:ident),+ $(,)?]) => {
        impl $crate::entity::Entity for $ty {
            const TABLE: &'static str = $table;
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn id(&self) -> u64 {
                self.id
            }

            fn set_id(&mut self, id: u64) {
                self.id = id;
            }

            fn field_values(
                &self,
            ) -> ::std::result::Result<
                ::std::vec::Vec<$crate::types::SqlValue>,
                $crate::error::SqlConnectError,
            > {
                Ok(vec![$($crate::conversion::ToSqlValue::to_sql_value(&self.$field)?),+])
            }

            fn load<R: $crate::statement::RowSource + ?Sized>(
                &mut self,
                row: &R,
            ) -> ::std::result::Result<(), $crate::error::SqlConnectError> {
                let mut cols = $crate::statement::ColumnReader::new(row);
                self.id = cols.read()?;
                $(self.$field = cols.read()?;)+
                Ok(())
            }
        }
    };
}
