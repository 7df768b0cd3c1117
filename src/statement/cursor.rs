use crate::error::SqlConnectError;
use crate::types::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    Exhausted,
}

/// Forward-only cursor over rows fetched by one execution.
#[derive(Debug)]
pub(crate) struct RowCursor {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    position: Position,
}

impl Default for RowCursor {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            position: Position::BeforeFirst,
        }
    }
}

impl RowCursor {
    /// Replace the cursor contents with a fresh result.
    pub(crate) fn load(&mut self, columns: Vec<String>, rows: Vec<Vec<SqlValue>>) {
        self.columns = columns;
        self.rows = rows;
        self.position = Position::BeforeFirst;
    }

    /// Keep the column shape but drop all rows.
    pub(crate) fn clear_rows(&mut self) {
        self.rows.clear();
        self.position = Position::BeforeFirst;
    }

    pub(crate) fn advance(&mut self) -> bool {
        let next = match self.position {
            Position::BeforeFirst => 0,
            Position::At(i) => i + 1,
            Position::Exhausted => return false,
        };
        if next < self.rows.len() {
            self.position = Position::At(next);
            true
        } else {
            self.position = Position::Exhausted;
            false
        }
    }

    pub(crate) fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn column_name(&self, index: usize) -> Result<String, SqlConnectError> {
        self.columns.get(index).cloned().ok_or_else(|| {
            SqlConnectError::OutOfRange(format!(
                "column {index} (statement has {} columns)",
                self.columns.len()
            ))
        })
    }

    pub(crate) fn value(&self, index: usize) -> Result<SqlValue, SqlConnectError> {
        if index >= self.columns.len() {
            return Err(SqlConnectError::OutOfRange(format!(
                "column {index} (statement has {} columns)",
                self.columns.len()
            )));
        }
        let Position::At(row) = self.position else {
            return Err(SqlConnectError::StatementError(
                "no current row; call move_next first".to_string(),
            ));
        };
        self.rows
            .get(row)
            .and_then(|r| r.get(index))
            .cloned()
            .ok_or_else(|| SqlConnectError::OutOfRange(format!("column {index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_forward_and_stays_exhausted() {
        let mut cursor = RowCursor::default();
        cursor.load(
            vec!["a".into()],
            vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
        );
        assert!(matches!(cursor.value(0), Err(SqlConnectError::StatementError(_))));
        assert!(cursor.advance());
        assert_eq!(cursor.value(0).unwrap(), SqlValue::Int(1));
        assert!(cursor.advance());
        assert!(!cursor.advance());
        assert!(!cursor.advance());
        assert!(cursor.value(0).is_err());
        assert!(matches!(cursor.value(1), Err(SqlConnectError::OutOfRange(_))));
    }
}
