// DuckDB backend:
// - config: options and builder read from the parameter bag
// - params: value conversion to and from DuckDB values
// - statement: prepared statement with RETURNING-based identity capture
// - connection: the session, appender bulk insert and maintenance helpers

pub mod config;
pub mod connection;
pub mod params;
pub mod statement;

pub use config::{DuckOptions, DuckOptionsBuilder};
pub use connection::{DuckConnect, is_valid_duckdb_file};
pub use statement::DuckStatement;
