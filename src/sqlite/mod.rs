// SQLite backend, split the same way as the other backends:
// - config: options and builder read from the parameter bag
// - params: value conversion to and from SQLite storage classes
// - statement: prepared statement with materialized rows
// - connection: the session and its DbConnect implementation
// - util: online backup, restore and file removal

pub mod config;
pub mod connection;
pub mod params;
pub mod statement;
pub mod util;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnect;
pub use statement::SqliteStatement;
pub use util::{online_backup, recover_from_backup, remove_db_file};
