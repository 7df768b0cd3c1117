// PostgreSQL backend (also TimescaleDB):
// - config: options and builder read from the parameter bag
// - params: type-aware encoding of bound values and row extraction
// - statement: server-side prepared statement with RETURNING identity capture
// - connection: blocking session over a private tokio runtime, with reconnect

pub mod config;
pub mod connection;
pub mod params;
pub mod statement;

pub use config::{PostgresOptions, PostgresOptionsBuilder};
pub use connection::PostgresConnect;
pub use params::postgres_extract_value;
pub use statement::PostgresStatement;
