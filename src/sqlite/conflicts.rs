//! SQLite-backed conflicts database.

use super::connection::log_sql;
use super::pool::{LazyPool, PoolConfig};
use crate::conflicts::{Conflicts, ConflictsDatabase};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::VecDeque;
use std::path::Path;
use tracing::debug;

/// Rows fetched per round trip by [`ConflictsDatabase::get`].
const PAGE_SIZE: usize = 256;

fn init_schema(conn: &Connection) -> Result<()> {
    debug!("initializing conflicts schema");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conflicts (
             namespace VARCHAR NOT NULL,
             path VARCHAR NOT NULL,
             conflict VARCHAR,
             PRIMARY KEY (namespace, path)
         );",
    )?;
    Ok(())
}

/// Merge conflicts in a pooled SQLite database.
pub struct SqliteConflictsDatabase {
    pool: LazyPool,
}

impl SqliteConflictsDatabase {
    /// The pool is created on first use.
    pub fn new(path: impl AsRef<Path>, config: PoolConfig) -> Self {
        Self {
            pool: LazyPool::new(path, config, init_schema),
        }
    }

    pub fn is_open(&self) -> bool {
        self.pool.is_open()
    }

    /// One page of `(path, conflict)` rows after `after`, in path order.
    fn page(
        &self,
        namespace: &str,
        filter: &str,
        after: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let sql = "SELECT path, conflict FROM conflicts
                   WHERE namespace = ?1
                     AND (?2 = '' OR instr(path, ?2) > 0)
                     AND (?3 IS NULL OR path > ?3)
                   ORDER BY path
                   LIMIT ?4";
        log_sql(sql, &[namespace, filter, after.unwrap_or("")]);

        let conn = self.pool.connection()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![namespace, filter, after, PAGE_SIZE as i64], |row| {
            let path: String = row.get(0)?;
            let conflict: Option<String> = row.get(1)?;
            Ok((path, conflict.unwrap_or_default()))
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}

/// Keyset-paged conflict scan; each page is a fresh query.
struct ConflictPages<'a> {
    db: &'a SqliteConflictsDatabase,
    namespace: String,
    filter: String,
    last_path: Option<String>,
    buffered: VecDeque<(String, String)>,
    exhausted: bool,
}

impl Iterator for ConflictPages<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffered.is_empty() && !self.exhausted {
            match self
                .db
                .page(&self.namespace, &self.filter, self.last_path.as_deref())
            {
                Ok(rows) => {
                    self.exhausted = rows.len() < PAGE_SIZE;
                    self.buffered.extend(rows);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        let (path, conflict) = self.buffered.pop_front()?;
        self.last_path = Some(path);
        Some(Ok(conflict))
    }
}

impl ConflictsDatabase for SqliteConflictsDatabase {
    fn count(&self, namespace: &str) -> Result<u64> {
        let sql = "SELECT count(*) FROM conflicts WHERE namespace = ?1";
        log_sql(sql, &[namespace]);
        let conn = self.pool.connection()?;
        let count: i64 = conn.query_row(sql, params![namespace], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get<'a>(&'a self, namespace: &str, path_filter: &str) -> Result<Conflicts<'a>> {
        // Fail here rather than on first iteration if the store is unreachable.
        self.pool.get()?;
        Ok(Box::new(ConflictPages {
            db: self,
            namespace: namespace.to_string(),
            filter: path_filter.to_string(),
            last_path: None,
            buffered: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn get_conflict(&self, namespace: &str, path: &str) -> Result<Option<String>> {
        let sql = "SELECT conflict FROM conflicts WHERE namespace = ?1 AND path = ?2";
        log_sql(sql, &[namespace, path]);
        let conn = self.pool.connection()?;
        let conflict: Option<Option<String>> = conn
            .query_row(sql, params![namespace, path], |row| row.get(0))
            .optional()?;
        Ok(conflict.map(Option::unwrap_or_default))
    }

    fn put(&self, namespace: &str, path: &str, conflict: &str) -> Result<()> {
        self.pool.write(|tx| {
            let sql =
                "INSERT OR REPLACE INTO conflicts (namespace, path, conflict) VALUES (?1, ?2, ?3)";
            log_sql(sql, &[namespace, path, conflict]);
            tx.execute(sql, params![namespace, path, conflict])?;
            Ok(())
        })
    }

    fn remove(&self, namespace: &str, path: &str) -> Result<()> {
        self.pool.write(|tx| {
            let sql = "DELETE FROM conflicts WHERE namespace = ?1 AND path = ?2";
            log_sql(sql, &[namespace, path]);
            tx.execute(sql, params![namespace, path])?;
            Ok(())
        })
    }

    fn remove_all(&self, namespace: &str) -> Result<()> {
        self.pool.write(|tx| {
            let sql = "DELETE FROM conflicts WHERE namespace = ?1";
            log_sql(sql, &[namespace]);
            tx.execute(sql, params![namespace])?;
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
    use tempfile::TempDir;

    fn database(dir: &TempDir) -> SqliteConflictsDatabase {
        SqliteConflictsDatabase::new(dir.path().join("conflicts.db"), PoolConfig::default())
    }

    #[test]
    fn test_get_spans_pages() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir);

        let total = PAGE_SIZE * 2 + 3;
        for i in 0..total {
            db.put("ns", &format!("roads/{i:05}"), &format!("c{i}")).unwrap();
        }
        db.put("ns", "buildings/1", "other").unwrap();

        let conflicts: Vec<String> = db
            .get("ns", "roads/")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(conflicts.len(), total);
        assert_eq!(conflicts[0], "c0");
        assert_eq!(conflicts[total - 1], format!("c{}", total - 1));
    }

    #[test]
    fn test_filter_wildcards_are_literal() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir);

        db.put("ns", "a_b", "underscore").unwrap();
        db.put("ns", "axb", "plain").unwrap();
        db.put("ns", "50%", "percent").unwrap();

        let found: Vec<String> = db.get("ns", "_").unwrap().map(|c| c.unwrap()).collect();
        assert_eq!(found, vec!["underscore"]);

        let found: Vec<String> = db.get("ns", "%").unwrap().map(|c| c.unwrap()).collect();
        assert_eq!(found, vec!["percent"]);

        let found: Vec<String> = db
            .get("ns", "' OR 1=1 --")
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert!(found.is_empty());
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir);
        db.put("ns", "roads/a", "c1").unwrap();

        assert_eq!(db.get("ns", "ROADS/").unwrap().count(), 0);
        let found: Vec<String> = db.get("ns", "roads/").unwrap().map(|c| c.unwrap()).collect();
        assert_eq!(found, vec!["c1"]);
    }
}
