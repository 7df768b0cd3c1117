use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SqlConnectError;
use crate::statement::RowSource;
use crate::types::SqlValue;

/// A row from a database query result
///
/// Column names and the name lookup map are shared by every row of one
/// [`ResultSet`](super::ResultSet).
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<SqlValue>,
    column_index: Arc<HashMap<String, usize>>,
}

pub(super) fn column_index_map(column_names: &[String]) -> Arc<HashMap<String, usize>> {
    Arc::new(
        column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect(),
    )
}

impl DbRow {
    /// Create a new database row
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names
    /// * `values` - The values for this row
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let column_index = column_index_map(&column_names);
        Self {
            column_names,
            values,
            column_index,
        }
    }

    pub(super) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<SqlValue>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Get a value from the row by column name
    ///
    /// # Returns
    ///
    /// The value at the column, or None if the column wasn't found
    #[must_use]
    pub fn get_by_name(&self, column_name: &str) -> Option<&SqlValue> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }
}

impl RowSource for DbRow {
    fn column_count(&self) -> usize {
        self.values.len()
    }

    fn column_name(&self, index: usize) -> Result<String, SqlConnectError> {
        self.column_names.get(index).cloned().ok_or_else(|| {
            SqlConnectError::OutOfRange(format!(
                "column {index} (row has {} columns)",
                self.column_names.len()
            ))
        })
    }

    fn column_value(&self, index: usize) -> Result<SqlValue, SqlConnectError> {
        self.values.get(index).cloned().ok_or_else(|| {
            SqlConnectError::OutOfRange(format!(
                "column {index} (row has {} columns)",
                self.values.len()
            ))
        })
    }
}
