//! Section/key/value settings store.

use crate::error::{Result, StoreError};

/// Entries in retrieval order, keyed by `"section.key"`.
pub type ConfigEntries = Vec<(String, String)>;

/// Persistent settings, at most one value per `(section, key)`.
pub trait ConfigDatabase: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Result<Option<String>>;

    /// Every entry as `("section.key", value)`.
    fn all(&self) -> Result<ConfigEntries>;

    /// Every entry of one section as `("section.key", value)`.
    fn all_in(&self, section: &str) -> Result<ConfigEntries>;

    /// Keys of one section.
    fn list(&self, section: &str) -> Result<Vec<String>>;

    /// Set a value, replacing any previous one.
    fn put(&self, section: &str, key: &str, value: &str) -> Result<()>;

    /// Remove one entry. Removing a missing entry is not an error.
    fn remove(&self, section: &str, key: &str) -> Result<()>;

    /// Remove every entry of a section.
    fn remove_all(&self, section: &str) -> Result<()>;

    /// Release backend resources. Safe to call more than once.
    fn close(&self) -> Result<()>;

    /// Look up a dotted name such as `remote.origin.url`.
    fn get_value(&self, name: &str) -> Result<Option<String>> {
        let (section, key) = split_name(name)?;
        self.get(section, key)
    }

    /// Set a dotted name such as `remote.origin.url`.
    fn put_value(&self, name: &str, value: &str) -> Result<()> {
        let (section, key) = split_name(name)?;
        self.put(section, key, value)
    }
}

/// Split `section.key` at the last dot.
pub fn split_name(name: &str) -> Result<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((section, key)) if !section.is_empty() && !key.is_empty() => Ok((section, key)),
        _ => Err(StoreError::InvalidArgument(format!(
            "config name must look like section.key: {name:?}"
        ))),
    }
}

/// Join a section and key into the dotted form used by [`ConfigDatabase::all`].
pub fn join_name(section: &str, key: &str) -> String {
    format!("{section}.{key}")
}
