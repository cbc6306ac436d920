//! Store tying the object, config and conflicts databases together.

use crate::config::StoreConfig;
use crate::configdb::ConfigDatabase;
use crate::conflicts::ConflictsDatabase;
use crate::error::Result;
use crate::format::OBJECTS_STORAGE;
use crate::odb::ObjectDatabase;
use crate::sqlite::{SqliteConfigDatabase, SqliteConflictsDatabase, SqliteObjectDatabase};
use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

/// A repository's storage on disk.
///
/// Opening a store configures the object database's format marker if it has
/// none yet, then verifies it. A store whose marker belongs to another format
/// or version fails to open with `ConfigMismatch`, as does a read-only open of
/// a store that was never configured.
pub struct Store {
    config: StoreConfig,
    settings: Arc<SqliteConfigDatabase>,
    objects: SqliteObjectDatabase,
    conflicts: SqliteConflictsDatabase,
}

impl Store {
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;

        let settings = Arc::new(SqliteConfigDatabase::new(
            config.config_path(),
            config.pool.clone(),
        ));
        let objects = SqliteObjectDatabase::from_config(
            &config,
            Arc::clone(&settings) as Arc<dyn ConfigDatabase>,
        );
        let conflicts = SqliteConflictsDatabase::new(config.conflicts_path(), config.pool.clone());

        objects.open()?;
        if config.read_only {
            objects.format().require(OBJECTS_STORAGE, settings.as_ref())?;
        } else {
            objects.configure()?;
        }
        objects.check_config()?;

        debug!(path = %config.path.display(), read_only = config.read_only, "opened store");
        Ok(Self {
            config,
            settings,
            objects,
            conflicts,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn objects(&self) -> &SqliteObjectDatabase {
        &self.objects
    }

    /// Repository settings, including the format markers.
    pub fn settings(&self) -> &SqliteConfigDatabase {
        &self.settings
    }

    pub fn conflicts(&self) -> &SqliteConflictsDatabase {
        &self.conflicts
    }

    /// Close every database. All three are closed even if one fails; the
    /// first failure is returned.
    pub fn close(&self) -> Result<()> {
        let results = [
            self.objects.close(),
            self.conflicts.close(),
            self.settings.close(),
        ];
        results.into_iter().collect()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close store on drop");
        }
    }
}
