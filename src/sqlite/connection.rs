//! Opening and preparing SQLite connections.

use crate::error::Result;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

/// Default time a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection to the database file at `path`, creating the file and
/// its parent directory if needed.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    debug!(path = %path.display(), "opening sqlite connection");
    let conn = Connection::open(path)?;
    prepare_connection(&conn, busy_timeout)?;
    Ok(conn)
}

/// Pragmas applied to every connection, pooled or not.
pub fn prepare_connection(
    conn: &Connection,
    busy_timeout: Duration,
) -> std::result::Result<(), rusqlite::Error> {
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// Trace a statement and the values bound to it.
pub(crate) fn log_sql(sql: &str, args: &[&str]) {
    trace!(target: "geostore::sql", sql, ?args, "executing");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("test.db");

        let conn = open_connection(&path, DEFAULT_BUSY_TIMEOUT).unwrap();
        assert!(path.exists());

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
