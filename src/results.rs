//! Materialized query results.
//!
//! Backends fetch rows into these types when the caller wants the whole
//! result at once (batch loads, paging, `query_result_set`). Both implement
//! [`RowSource`](crate::statement::RowSource) row-wise, so entity loading
//! code is shared with live statement cursors.

mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::DbRow;
