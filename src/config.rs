//! Store configuration.

use crate::sqlite::PoolConfig;
use std::path::PathBuf;

/// File name of the object database inside the store directory.
pub const OBJECTS_FILE: &str = "objects.db";

/// File name of the config database inside the store directory.
pub const CONFIG_FILE: &str = "config.db";

/// File name of the conflicts database inside the store directory.
pub const CONFLICTS_FILE: &str = "conflicts.db";

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base directory holding the database files.
    pub path: PathBuf,

    /// Reject every mutating object-database operation.
    pub read_only: bool,

    /// Decoded-object cache size (number of objects). Zero disables the cache.
    pub object_cache_size: usize,

    /// Pool settings for the config and conflicts databases.
    pub pool: PoolConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./geostore"),
            read_only: false,
            object_cache_size: 1000,
            pool: PoolConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at `path` with every other setting at its default.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn objects_path(&self) -> PathBuf {
        self.path.join(OBJECTS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    pub fn conflicts_path(&self) -> PathBuf {
        self.path.join(CONFLICTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::at("/tmp/repo");
        assert!(!config.read_only);
        assert_eq!(config.objects_path(), PathBuf::from("/tmp/repo/objects.db"));
        assert_eq!(config.config_path(), PathBuf::from("/tmp/repo/config.db"));
        assert_eq!(config.conflicts_path(), PathBuf::from("/tmp/repo/conflicts.db"));
        assert_eq!(config.pool.max_size, 10);
        assert_eq!(config.pool.min_idle, 0);
        assert_eq!(config.pool.idle_timeout, Duration::from_secs(10));
    }
}
