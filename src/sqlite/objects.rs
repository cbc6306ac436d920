//! SQLite storage for the object database.

use super::connection::{log_sql, open_connection, DEFAULT_BUSY_TIMEOUT};
use super::transaction::write_transaction;
use crate::config::StoreConfig;
use crate::configdb::ConfigDatabase;
use crate::error::{Result, StoreError};
use crate::format::VersionedFormat;
use crate::odb::{BackedObjectDatabase, ObjectBackend};
use crate::types::ObjectId;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Format name recorded in the config database by SQLite object stores.
pub const SQLITE_FORMAT: &str = "sqlite";

/// Format version recorded in the config database by SQLite object stores.
pub const SQLITE_FORMAT_VERSION: &str = "0.1";

/// Object database stored in a single SQLite file.
pub type SqliteObjectDatabase = BackedObjectDatabase<SqliteObjectBackend>;

/// Objects table primitives. Ids are stored as lowercase hex.
#[derive(Clone, Debug)]
pub struct SqliteObjectBackend {
    busy_timeout: Duration,
}

impl Default for SqliteObjectBackend {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl SqliteObjectBackend {
    pub fn new(busy_timeout: Duration) -> Self {
        Self { busy_timeout }
    }
}

fn parse_id(hex: &str) -> Result<ObjectId> {
    ObjectId::from_hex(hex)
        .map_err(|e| StoreError::Serialization(format!("malformed object id {hex:?}: {e}")))
}

impl ObjectBackend for SqliteObjectBackend {
    type Connection = Connection;

    fn connect(&self, location: &Path) -> Result<Connection> {
        open_connection(location, self.busy_timeout)
    }

    fn close(&self, conn: Connection) -> Result<()> {
        conn.close().map_err(|(_, e)| StoreError::Database(e))
    }

    fn init(&self, conn: &mut Connection) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'objects'",
            [],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(());
        }

        debug!("creating objects table");
        write_transaction(conn, |tx| {
            let sql = "CREATE TABLE IF NOT EXISTS objects (id TEXT PRIMARY KEY, object BLOB)";
            log_sql(sql, &[]);
            tx.execute(sql, [])?;
            Ok(())
        })
    }

    fn has(&self, conn: &mut Connection, id: &ObjectId) -> Result<bool> {
        let sql = "SELECT count(*) FROM objects WHERE id = ?1";
        let hex = id.to_hex();
        log_sql(sql, &[hex.as_str()]);
        let count: i64 = conn.query_row(sql, params![hex], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn search(&self, conn: &mut Connection, prefix: &str) -> Result<Vec<ObjectId>> {
        let sql = "SELECT id FROM objects WHERE id LIKE ?1 || '%' ORDER BY id";
        log_sql(sql, &[prefix]);
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for hex in rows {
            ids.push(parse_id(&hex?)?);
        }
        Ok(ids)
    }

    fn get(&self, conn: &mut Connection, id: &ObjectId) -> Result<Option<Vec<u8>>> {
        let sql = "SELECT object FROM objects WHERE id = ?1";
        let hex = id.to_hex();
        log_sql(sql, &[hex.as_str()]);
        Ok(conn
            .query_row(sql, params![hex], |row| row.get(0))
            .optional()?)
    }

    fn put(&self, conn: &mut Connection, id: &ObjectId, bytes: &[u8]) -> Result<bool> {
        let hex = id.to_hex();
        write_transaction(conn, |tx| {
            let sql = "INSERT OR IGNORE INTO objects (id, object) VALUES (?1, ?2)";
            log_sql(sql, &[hex.as_str(), "<blob>"]);
            let changed = tx.execute(sql, params![hex, bytes])?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, conn: &mut Connection, id: &ObjectId) -> Result<bool> {
        let hex = id.to_hex();
        write_transaction(conn, |tx| {
            let sql = "DELETE FROM objects WHERE id = ?1";
            log_sql(sql, &[hex.as_str()]);
            let changed = tx.execute(sql, params![hex])?;
            Ok(changed > 0)
        })
    }
}

impl BackedObjectDatabase<SqliteObjectBackend> {
    /// Object database at the store's `objects.db`, gated by `config`.
    ///
    /// The database is not opened; call [`open`](crate::odb::ObjectDatabase::open).
    pub fn from_config(store: &StoreConfig, config: Arc<dyn ConfigDatabase>) -> Self {
        BackedObjectDatabase::new(
            SqliteObjectBackend::new(store.pool.busy_timeout),
            store.objects_path(),
            config,
            VersionedFormat::new(SQLITE_FORMAT, SQLITE_FORMAT_VERSION),
        )
        .read_only(store.read_only)
        .with_cache_size(store.object_cache_size)
    }
}
