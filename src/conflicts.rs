//! Persisted, unresolved merge conflicts.

use crate::error::Result;

/// Lazy sequence of conflict descriptors.
pub type Conflicts<'a> = Box<dyn Iterator<Item = Result<String>> + Send + 'a>;

/// Conflict descriptors keyed by `(namespace, path)`.
///
/// A namespace groups the conflicts of one in-progress merge. Descriptors are
/// opaque to the store.
pub trait ConflictsDatabase: Send + Sync {
    /// Number of conflicts recorded in `namespace`.
    fn count(&self, namespace: &str) -> Result<u64>;

    /// Descriptors in `namespace` whose path contains `path_filter`, in path
    /// order. Matching is case-sensitive. Rows are fetched lazily as the
    /// iterator advances.
    ///
    /// An empty filter matches every path.
    fn get<'a>(&'a self, namespace: &str, path_filter: &str) -> Result<Conflicts<'a>>;

    /// The descriptor recorded for exactly `path`, if any.
    fn get_conflict(&self, namespace: &str, path: &str) -> Result<Option<String>>;

    /// Record a conflict, replacing any previous one at the same path.
    fn put(&self, namespace: &str, path: &str, conflict: &str) -> Result<()>;

    /// Forget the conflict at `path`.
    fn remove(&self, namespace: &str, path: &str) -> Result<()>;

    /// Forget every conflict in `namespace`.
    fn remove_all(&self, namespace: &str) -> Result<()>;

    /// Release backend resources. Safe to call more than once.
    fn close(&self) -> Result<()>;

    fn has_conflicts(&self, namespace: &str) -> Result<bool> {
        Ok(self.count(namespace)? > 0)
    }
}
