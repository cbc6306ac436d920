//! SQLite implementations of the object, config and conflicts databases.
//!
//! The object database owns one connection. The config and conflicts
//! databases share nothing with it and each lazily create their own pool.
//! Every mutating statement runs through [`write_transaction`].

mod config;
mod conflicts;
mod connection;
mod objects;
mod pool;
mod transaction;

pub use config::SqliteConfigDatabase;
pub use conflicts::SqliteConflictsDatabase;
pub use connection::{open_connection, prepare_connection, DEFAULT_BUSY_TIMEOUT};
pub use objects::{SqliteObjectBackend, SqliteObjectDatabase, SQLITE_FORMAT, SQLITE_FORMAT_VERSION};
pub use pool::{LazyPool, PoolConfig, PooledConnection, SchemaInit, SqlitePool};
pub use transaction::write_transaction;
