//! SQLite-backed config database.

use super::connection::log_sql;
use super::pool::{LazyPool, PoolConfig};
use crate::configdb::{join_name, ConfigDatabase, ConfigEntries};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

fn init_schema(conn: &Connection) -> Result<()> {
    debug!("initializing config schema");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS config (
             section VARCHAR NOT NULL,
             key VARCHAR NOT NULL,
             value VARCHAR,
             PRIMARY KEY (section, key)
         );
         CREATE INDEX IF NOT EXISTS config_section_idx ON config (section);",
    )?;
    Ok(())
}

/// Config entries in a pooled SQLite database.
pub struct SqliteConfigDatabase {
    pool: LazyPool,
}

impl SqliteConfigDatabase {
    /// The pool is created on first use.
    pub fn new(path: impl AsRef<Path>, config: PoolConfig) -> Self {
        Self {
            pool: LazyPool::new(path, config, init_schema),
        }
    }

    pub fn is_open(&self) -> bool {
        self.pool.is_open()
    }

    pub fn location(&self) -> &Path {
        self.pool.location()
    }

    fn entries(&self, sql: &str, args: &[&str]) -> Result<ConfigEntries> {
        log_sql(sql, args);
        let conn = self.pool.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let section: String = row.get(0)?;
            let key: String = row.get(1)?;
            let value: Option<String> = row.get(2)?;
            Ok((join_name(&section, &key), value.unwrap_or_default()))
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}

impl ConfigDatabase for SqliteConfigDatabase {
    fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
        let sql = "SELECT value FROM config WHERE section = ?1 AND key = ?2";
        log_sql(sql, &[section, key]);
        let conn = self.pool.connection()?;
        let value: Option<Option<String>> = conn
            .query_row(sql, params![section, key], |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    fn all(&self) -> Result<ConfigEntries> {
        self.entries("SELECT section, key, value FROM config", &[])
    }

    fn all_in(&self, section: &str) -> Result<ConfigEntries> {
        self.entries(
            "SELECT section, key, value FROM config WHERE section = ?1",
            &[section],
        )
    }

    fn list(&self, section: &str) -> Result<Vec<String>> {
        let sql = "SELECT key FROM config WHERE section = ?1";
        log_sql(sql, &[section]);
        let conn = self.pool.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let keys = stmt
            .query_map(params![section], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(keys)
    }

    fn put(&self, section: &str, key: &str, value: &str) -> Result<()> {
        self.pool.write(|tx| {
            let sql = "DELETE FROM config WHERE section = ?1 AND key = ?2";
            log_sql(sql, &[section, key]);
            tx.execute(sql, params![section, key])?;

            let sql = "INSERT OR REPLACE INTO config (section, key, value) VALUES (?1, ?2, ?3)";
            log_sql(sql, &[section, key, value]);
            tx.execute(sql, params![section, key, value])?;
            Ok(())
        })
    }

    fn remove(&self, section: &str, key: &str) -> Result<()> {
        self.pool.write(|tx| {
            let sql = "DELETE FROM config WHERE section = ?1 AND key = ?2";
            log_sql(sql, &[section, key]);
            tx.execute(sql, params![section, key])?;
            Ok(())
        })
    }

    fn remove_all(&self, section: &str) -> Result<()> {
        self.pool.write(|tx| {
            let sql = "DELETE FROM config WHERE section = ?1";
            log_sql(sql, &[section]);
            tx.execute(sql, params![section])?;
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> SqliteConfigDatabase {
        SqliteConfigDatabase::new(dir.path().join("config.db"), PoolConfig::default())
    }

    fn row_count(db: &SqliteConfigDatabase) -> i64 {
        db.pool
            .connection()
            .unwrap()
            .query_row("SELECT count(*) FROM config", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_pool_is_lazy() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        assert!(!db.is_open());
        assert!(db.get("user", "name").unwrap().is_none());
        assert!(db.is_open());

        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
    }

    #[test]
    fn test_put_replaces_value() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        db.put("user", "name", "first").unwrap();
        db.put("user", "name", "second").unwrap();
        assert_eq!(db.get("user", "name").unwrap().as_deref(), Some("second"));
        assert_eq!(row_count(&db), 1);
    }

    #[test]
    fn test_failed_put_leaves_rows_unchanged() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        db.put("core", "kept", "1").unwrap();
        db.put("core", "poisoned", "old").unwrap();

        db.pool
            .connection()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_poisoned BEFORE INSERT ON config
                 WHEN NEW.key = 'poisoned'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let before = row_count(&db);
        let err = db.put("core", "poisoned", "new").unwrap_err();
        assert!(matches!(err, StoreError::Transaction(_)));

        // The delete that ran before the failing insert was rolled back.
        assert_eq!(row_count(&db), before);
        assert_eq!(db.get("core", "poisoned").unwrap().as_deref(), Some("old"));
    }
}
