//! Versioned on-disk format markers.
//!
//! A store records which engine format wrote it as two config entries:
//! `storage.<store> = <format>` and `<format>.version = <version>`. The marker
//! is written once by [`VersionedFormat::configure`] and compared on every
//! open by [`VersionedFormat::verify`].

use crate::configdb::ConfigDatabase;
use crate::error::{Result, StoreError};
use std::fmt;
use tracing::debug;

/// Config section holding the format name of each store.
pub const STORAGE_SECTION: &str = "storage";

/// Config key, under the format's own section, holding its version.
pub const VERSION_KEY: &str = "version";

/// Store name used by object databases.
pub const OBJECTS_STORAGE: &str = "objects";

/// A (format name, version) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionedFormat {
    pub format: String,
    pub version: String,
}

/// Where a store stands with respect to an expected format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatState {
    /// No marker persisted yet.
    Unconfigured,
    /// Marker matches.
    Valid,
    /// Marker persisted by a different format or version.
    Invalid { found: VersionedFormat },
}

impl VersionedFormat {
    pub fn new(format: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            version: version.into(),
        }
    }

    /// Read the persisted marker of `storage` and compare it with `self`.
    pub fn state(&self, storage: &str, config: &dyn ConfigDatabase) -> Result<FormatState> {
        let Some(format) = config.get(STORAGE_SECTION, storage)? else {
            return Ok(FormatState::Unconfigured);
        };
        let version = config.get(&format, VERSION_KEY)?.unwrap_or_default();
        let found = VersionedFormat::new(format, version);
        if &found == self {
            Ok(FormatState::Valid)
        } else {
            Ok(FormatState::Invalid { found })
        }
    }

    /// Persist the marker for `storage` if none exists yet.
    ///
    /// Configuring an already configured store with the same format is a
    /// no-op; configuring it with a different one fails with
    /// `ConfigMismatch`, since a marker is never rewritten in place.
    pub fn configure(&self, storage: &str, config: &dyn ConfigDatabase) -> Result<()> {
        match config.get(STORAGE_SECTION, storage)? {
            None => {
                debug!(storage, format = %self, "writing format marker");
                config.put(STORAGE_SECTION, storage, &self.format)?;
                config.put(&self.format, VERSION_KEY, &self.version)?;
                Ok(())
            }
            Some(format) if format == self.format => {
                match config.get(&self.format, VERSION_KEY)? {
                    None => config.put(&self.format, VERSION_KEY, &self.version),
                    Some(version) if version == self.version => Ok(()),
                    Some(version) => {
                        let found = VersionedFormat::new(format, version);
                        Err(self.mismatch(storage, Some(found)))
                    }
                }
            }
            Some(format) => {
                let version = config.get(&format, VERSION_KEY)?.unwrap_or_default();
                Err(self.mismatch(storage, Some(VersionedFormat::new(format, version))))
            }
        }
    }

    /// Fail with `ConfigMismatch` if `storage` carries a different marker.
    ///
    /// A store with no marker yet is unverified rather than invalid and
    /// passes; use [`require`](Self::require) where a marker must exist.
    pub fn verify(&self, storage: &str, config: &dyn ConfigDatabase) -> Result<()> {
        match self.state(storage, config)? {
            FormatState::Valid => Ok(()),
            FormatState::Unconfigured => {
                debug!(storage, format = %self, "no format marker to verify");
                Ok(())
            }
            FormatState::Invalid { found } => Err(self.mismatch(storage, Some(found))),
        }
    }

    /// Like [`verify`](Self::verify), but a missing marker is a `ConfigMismatch`.
    pub fn require(&self, storage: &str, config: &dyn ConfigDatabase) -> Result<()> {
        match self.state(storage, config)? {
            FormatState::Valid => Ok(()),
            FormatState::Unconfigured => Err(self.mismatch(storage, None)),
            FormatState::Invalid { found } => Err(self.mismatch(storage, Some(found))),
        }
    }

    fn mismatch(&self, storage: &str, found: Option<VersionedFormat>) -> StoreError {
        StoreError::ConfigMismatch {
            storage: storage.to_string(),
            expected: self.to_string(),
            found: found.map(|f| f.to_string()),
        }
    }
}

impl fmt::Display for VersionedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.format, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configdb::ConfigEntries;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// Map-backed config for exercising the gate without a database.
    #[derive(Default)]
    struct MapConfig(Mutex<BTreeMap<(String, String), String>>);

    impl ConfigDatabase for MapConfig {
        fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
            Ok(self.0.lock().get(&(section.into(), key.into())).cloned())
        }

        fn all(&self) -> Result<ConfigEntries> {
            Ok(self
                .0
                .lock()
                .iter()
                .map(|((s, k), v)| (format!("{s}.{k}"), v.clone()))
                .collect())
        }

        fn all_in(&self, section: &str) -> Result<ConfigEntries> {
            Ok(self
                .all()?
                .into_iter()
                .filter(|(name, _)| name.starts_with(&format!("{section}.")))
                .collect())
        }

        fn list(&self, section: &str) -> Result<Vec<String>> {
            Ok(self
                .0
                .lock()
                .keys()
                .filter(|(s, _)| s == section)
                .map(|(_, k)| k.clone())
                .collect())
        }

        fn put(&self, section: &str, key: &str, value: &str) -> Result<()> {
            self.0
                .lock()
                .insert((section.into(), key.into()), value.into());
            Ok(())
        }

        fn remove(&self, section: &str, key: &str) -> Result<()> {
            self.0.lock().remove(&(section.into(), key.into()));
            Ok(())
        }

        fn remove_all(&self, section: &str) -> Result<()> {
            self.0.lock().retain(|(s, _), _| s != section);
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_configure_then_verify() {
        let config = MapConfig::default();
        let format = VersionedFormat::new("sqlite", "0.1");

        assert_eq!(
            format.state(OBJECTS_STORAGE, &config).unwrap(),
            FormatState::Unconfigured
        );
        format.configure(OBJECTS_STORAGE, &config).unwrap();
        format.configure(OBJECTS_STORAGE, &config).unwrap();
        format.verify(OBJECTS_STORAGE, &config).unwrap();

        assert_eq!(
            config.get(STORAGE_SECTION, OBJECTS_STORAGE).unwrap().as_deref(),
            Some("sqlite")
        );
        assert_eq!(
            config.get("sqlite", VERSION_KEY).unwrap().as_deref(),
            Some("0.1")
        );
    }

    #[test]
    fn test_unconfigured_is_unverified_not_invalid() {
        let config = MapConfig::default();
        let format = VersionedFormat::new("sqlite", "0.1");

        format.verify(OBJECTS_STORAGE, &config).unwrap();
        let err = format.require(OBJECTS_STORAGE, &config).unwrap_err();
        assert!(matches!(err, StoreError::ConfigMismatch { found: None, .. }));

        format.configure(OBJECTS_STORAGE, &config).unwrap();
        format.require(OBJECTS_STORAGE, &config).unwrap();
    }

    #[test]
    fn test_version_mismatch() {
        let config = MapConfig::default();
        VersionedFormat::new("sqlite", "0.1")
            .configure(OBJECTS_STORAGE, &config)
            .unwrap();

        let newer = VersionedFormat::new("sqlite", "0.2");
        assert_eq!(
            newer.state(OBJECTS_STORAGE, &config).unwrap(),
            FormatState::Invalid {
                found: VersionedFormat::new("sqlite", "0.1")
            }
        );
        let err = newer.verify(OBJECTS_STORAGE, &config).unwrap_err();
        match err {
            StoreError::ConfigMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "sqlite 0.2");
                assert_eq!(found.as_deref(), Some("sqlite 0.1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The marker is never rewritten by configure.
        assert!(newer.configure(OBJECTS_STORAGE, &config).is_err());
        assert_eq!(
            config.get("sqlite", VERSION_KEY).unwrap().as_deref(),
            Some("0.1")
        );
    }

    #[test]
    fn test_format_mismatch() {
        let config = MapConfig::default();
        VersionedFormat::new("rocksdb", "1")
            .configure(OBJECTS_STORAGE, &config)
            .unwrap();

        let err = VersionedFormat::new("sqlite", "0.1")
            .configure(OBJECTS_STORAGE, &config)
            .unwrap_err();
        assert!(matches!(err, StoreError::ConfigMismatch { .. }));
    }
}
