//! Lazily created, per-instance connection pools.

use super::connection::{prepare_connection, DEFAULT_BUSY_TIMEOUT};
use super::transaction::write_transaction;
use crate::error::Result;
use parking_lot::Mutex;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Creates the schema a pool's database needs. Must be idempotent.
pub type SchemaInit = fn(&Connection) -> Result<()>;

/// Pool sizing and timeouts.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of open connections.
    pub max_size: u32,

    /// Idle connections kept around. Zero lets the pool shrink to nothing.
    pub min_idle: u32,

    /// Idle connections older than this are closed.
    pub idle_timeout: Duration,

    /// How long a caller waits for a free connection before failing.
    pub connection_timeout: Duration,

    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 0,
            idle_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(30),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// A pool created on first use and cached by the instance that owns it.
///
/// The location is resolved to its canonical form once, when the pool is
/// built; later checkouts reuse the cached pool without touching the
/// filesystem. Creation happens under the lock: concurrent first accesses
/// build exactly one pool and run the schema initializer once.
pub struct LazyPool {
    location: PathBuf,
    config: PoolConfig,
    schema: SchemaInit,
    pool: Mutex<Option<(PathBuf, SqlitePool)>>,
}

impl LazyPool {
    pub fn new(location: impl AsRef<Path>, config: PoolConfig, schema: SchemaInit) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            config,
            schema,
            pool: Mutex::new(None),
        }
    }

    /// The configured (unresolved) location.
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.pool.lock().is_some()
    }

    /// The pool, creating it and initializing the schema on first access.
    pub fn get(&self) -> Result<SqlitePool> {
        let mut slot = self.pool.lock();
        if let Some((_, pool)) = slot.as_ref() {
            return Ok(pool.clone());
        }

        let resolved = resolve(&self.location)?;
        let pool = self.build(&resolved)?;
        *slot = Some((resolved, pool.clone()));
        Ok(pool)
    }

    /// Check out a connection.
    pub fn connection(&self) -> Result<PooledConnection> {
        Ok(self.get()?.get()?)
    }

    /// Run `work` in a write transaction on a pooled connection.
    pub fn write<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        write_transaction(&mut conn, work)
    }

    /// Drop the cached pool. Connections still checked out close when returned.
    pub fn close(&self) {
        if let Some((key, _)) = self.pool.lock().take() {
            debug!(path = %key.display(), "closed connection pool");
        }
    }

    fn build(&self, resolved: &Path) -> Result<SqlitePool> {
        let busy_timeout = self.config.busy_timeout;
        let manager = SqliteConnectionManager::file(resolved)
            .with_init(move |conn| prepare_connection(conn, busy_timeout));

        let pool = r2d2::Pool::builder()
            .max_size(self.config.max_size)
            .min_idle(Some(self.config.min_idle))
            .idle_timeout(Some(self.config.idle_timeout))
            .connection_timeout(self.config.connection_timeout)
            .build(manager)?;

        let mut conn = pool.get()?;
        write_transaction(&mut conn, |tx| (self.schema)(tx))?;

        debug!(
            path = %resolved.display(),
            max_size = self.config.max_size,
            "created connection pool"
        );
        Ok(pool)
    }
}

/// Canonical form of a database path whose file may not exist yet.
fn resolve(location: &Path) -> Result<PathBuf> {
    let parent = match location.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let parent = fs::canonicalize(&parent)?;
    Ok(match location.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS inits (n INTEGER);
             INSERT INTO inits VALUES (1);",
        )?;
        Ok(())
    }

    fn init_count(pool: &LazyPool) -> i64 {
        pool.connection()
            .unwrap()
            .query_row("SELECT count(*) FROM inits", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_lazy_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lazy.db");
        let pool = LazyPool::new(&path, PoolConfig::default(), schema);

        assert!(!pool.is_open());
        assert!(!path.exists());

        pool.get().unwrap();
        assert!(pool.is_open());
        assert!(path.exists());
        assert_eq!(pool.get().unwrap().max_size(), 10);
    }

    #[test]
    fn test_concurrent_first_access_builds_one_pool() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(LazyPool::new(
            dir.path().join("shared.db"),
            PoolConfig::default(),
            schema,
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    pool.get().unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(init_count(&pool), 1);
    }

    #[test]
    fn test_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let pool = LazyPool::new(dir.path().join("reopen.db"), PoolConfig::default(), schema);

        pool.get().unwrap();
        pool.close();
        pool.close();
        assert!(!pool.is_open());

        // Reopening runs the initializer again against the existing file.
        pool.get().unwrap();
        assert_eq!(init_count(&pool), 2);
    }

    #[test]
    fn test_checkout_does_not_resolve_again() {
        let dir = TempDir::new().unwrap();
        let parent = dir.path().join("sub");
        let pool = LazyPool::new(parent.join("cached.db"), PoolConfig::default(), schema);
        let first = pool.get().unwrap();

        // The parent can no longer be created, so resolving now would fail.
        fs::remove_dir_all(&parent).unwrap();
        fs::write(&parent, b"not a directory").unwrap();

        let again = pool.get().unwrap();
        assert_eq!(again.max_size(), first.max_size());
        assert!(resolve(&parent.join("cached.db")).is_err());
    }

    #[test]
    fn test_relative_location_resolves() {
        let resolved = resolve(Path::new("relative.db")).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved.file_name().unwrap(), "relative.db");
    }
}
