//! The prepared statement contract shared by every backend.
//!
//! A statement owns one prepared SQL text against one connection. It is
//! stateful: binding and then calling [`SqlStatement::exec`] drops any
//! previous result, and [`SqlStatement::move_next`] walks a single forward
//! cursor over the rows the last execution produced.
//!
//! ```rust,no_run
//! use sql_connect::prelude::*;
//!
//! # fn demo(conn: &dyn DbConnect) -> Result<(), SqlConnectError> {
//! let mut st = conn.statement("SELECT id, name FROM person WHERE age > ?")?;
//! st.bind(0, &30)?;
//! st.exec()?;
//! while st.move_next() {
//!     let mut cols = st.reader();
//!     let id: i64 = cols.read()?;
//!     let name: String = cols.read()?;
//!     println!("{id} {name}");
//! }
//! # Ok(())
//! # }
//! ```

mod cursor;

pub(crate) use cursor::RowCursor;

use crate::conversion::{FromSqlValue, ToSqlValue};
use crate::error::SqlConnectError;
use crate::types::{RowsAffected, SqlValue};

/// Anything that exposes a current row of typed columns.
pub trait RowSource {
    fn column_count(&self) -> usize;

    /// # Errors
    ///
    /// `OutOfRange` when `index >= column_count()`.
    fn column_name(&self, index: usize) -> Result<String, SqlConnectError>;

    /// Raw value of a column in the current row.
    ///
    /// # Errors
    ///
    /// `OutOfRange` for a bad index, `StatementError` when no row is current.
    fn column_value(&self, index: usize) -> Result<SqlValue, SqlConnectError>;
}

/// One prepared statement bound to a live connection.
pub trait SqlStatement: RowSource {
    /// The SQL text as sent to the backend.
    fn sql(&self) -> &str;

    /// Number of parameters the prepared text declares.
    fn param_count(&self) -> usize;

    /// Bind `value` to the zero-based parameter `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `index >= param_count()`.
    fn bind_value(&mut self, index: usize, value: SqlValue) -> Result<(), SqlConnectError>;

    /// Run the statement with the currently bound parameters.
    ///
    /// # Errors
    ///
    /// `Sql` with the backend-native code when the engine rejects it.
    fn exec(&mut self) -> Result<(), SqlConnectError>;

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    fn move_next(&mut self) -> bool;

    /// Identity produced by the last insert, or 0 when not applicable.
    fn last_rowid(&self) -> u64;

    fn rows_affected(&self) -> RowsAffected;
}

/// Sequential typed reads over the columns of the current row.
pub struct ColumnReader<'a, S: RowSource + ?Sized> {
    source: &'a S,
    next: usize,
}

impl<'a, S: RowSource + ?Sized> ColumnReader<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source, next: 0 }
    }

    /// Start reading at `index` instead of column 0.
    #[must_use]
    pub fn starting_at(mut self, index: usize) -> Self {
        self.next = index;
        self
    }

    /// Read the next column as `T`.
    ///
    /// # Errors
    ///
    /// Propagates the column access and conversion errors of [`RowSourceExt::get`].
    pub fn read<T: FromSqlValue>(&mut self) -> Result<T, SqlConnectError> {
        let value = self.source.column_value(self.next)?;
        let out = T::from_sql_value(value, self.next)?;
        self.next += 1;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) {
        self.next += n;
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.next
    }
}

/// Typed column helpers for every [`RowSource`].
pub trait RowSourceExt: RowSource {
    /// # Errors
    ///
    /// Column access errors, then `TypeMismatch`/`OutOfRange`/`NullBlob` from the conversion.
    fn get<T: FromSqlValue>(&self, index: usize) -> Result<T, SqlConnectError> {
        T::from_sql_value(self.column_value(index)?, index)
    }

    fn reader(&self) -> ColumnReader<'_, Self> {
        ColumnReader::new(self)
    }

    /// Column names of the current shape.
    ///
    /// # Errors
    ///
    /// Never for well-behaved sources; see [`RowSource::column_name`].
    fn column_names(&self) -> Result<Vec<String>, SqlConnectError> {
        (0..self.column_count()).map(|i| self.column_name(i)).collect()
    }
}

impl<T: RowSource + ?Sized> RowSourceExt for T {}

/// Typed binding helpers for every [`SqlStatement`].
pub trait SqlStatementExt: SqlStatement {
    /// # Errors
    ///
    /// Conversion errors from [`ToSqlValue`], then [`SqlStatement::bind_value`] errors.
    fn bind<T: ToSqlValue + ?Sized>(
        &mut self,
        index: usize,
        value: &T,
    ) -> Result<(), SqlConnectError> {
        let value = value.to_sql_value()?;
        self.bind_value(index, value)
    }

    /// Bind `values` to parameters `0..values.len()`.
    ///
    /// # Errors
    ///
    /// See [`SqlStatement::bind_value`].
    fn bind_all(&mut self, values: &[SqlValue]) -> Result<(), SqlConnectError> {
        for (i, value) in values.iter().enumerate() {
            self.bind_value(i, value.clone())?;
        }
        Ok(())
    }
}

impl<T: SqlStatement + ?Sized> SqlStatementExt for T {}

/// Bound parameter slots, validated against the declared count.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParamSlots {
    values: Vec<SqlValue>,
}

impl ParamSlots {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            values: vec![SqlValue::Null; count],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn set(&mut self, index: usize, value: SqlValue) -> Result<(), SqlConnectError> {
        let count = self.values.len();
        let slot = self.values.get_mut(index).ok_or_else(|| {
            SqlConnectError::OutOfRange(format!(
                "bind index {index} (statement has {count} parameters)"
            ))
        })?;
        *slot = value;
        Ok(())
    }

    pub(crate) fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_reject_out_of_range_binds() {
        let mut slots = ParamSlots::new(2);
        slots.set(1, SqlValue::Int(5)).unwrap();
        assert!(matches!(
            slots.set(2, SqlValue::Null),
            Err(SqlConnectError::OutOfRange(_))
        ));
        assert_eq!(slots.values(), &[SqlValue::Null, SqlValue::Int(5)]);
    }
}
