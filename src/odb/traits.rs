use std::path::Path;

use super::bulk::{BulkOutcome, GetAll};
use crate::error::{Result, StoreError};
use crate::objects::{
    RevCommit, RevFeature, RevFeatureType, RevObject, RevTag, RevTree, RevVariant,
};
use crate::types::ObjectId;

/// Storage primitives a backend provides to [`BackedObjectDatabase`].
///
/// A backend only moves opaque bytes keyed by id; encoding, id computation
/// and the public contract live in the database layer. Implementations must
/// make `init` safe to run on every open and make every mutating primitive
/// atomic.
///
/// [`BackedObjectDatabase`]: super::BackedObjectDatabase
pub trait ObjectBackend: Send + Sync {
    /// Live connection state, owned by exactly one database instance.
    type Connection: Send;

    fn connect(&self, location: &Path) -> Result<Self::Connection>;

    fn close(&self, conn: Self::Connection) -> Result<()>;

    /// Create the object table unless it already exists.
    fn init(&self, conn: &mut Self::Connection) -> Result<()>;

    fn has(&self, conn: &mut Self::Connection, id: &ObjectId) -> Result<bool>;

    /// Ids whose lowercase hex form starts with `prefix`.
    ///
    /// `prefix` has already been validated as lowercase hex.
    fn search(&self, conn: &mut Self::Connection, prefix: &str) -> Result<Vec<ObjectId>>;

    /// Stored bytes, or `None` if absent.
    fn get(&self, conn: &mut Self::Connection, id: &ObjectId) -> Result<Option<Vec<u8>>>;

    /// Store bytes under `id`. Returns `true` if a new entry was created.
    fn put(&self, conn: &mut Self::Connection, id: &ObjectId, bytes: &[u8]) -> Result<bool>;

    /// Returns `true` if an entry was removed.
    fn delete(&self, conn: &mut Self::Connection, id: &ObjectId) -> Result<bool>;
}

/// Content-addressed store of revision objects.
///
/// All implementations must satisfy these invariants:
/// - Storing is idempotent: the same object always lands on the same id.
/// - Every mutating call is atomic on its own; bulk calls are not atomic as
///   a whole, so a failure mid-batch leaves the earlier items written.
/// - Bytes that fail to decode are an error, never reported as absent.
pub trait ObjectDatabase: Send + Sync {
    /// Connect and initialize the schema. No-op if already open.
    fn open(&self) -> Result<()>;

    /// Release the connection. No-op if already closed.
    fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn is_read_only(&self) -> bool;

    /// Persist the format marker if the store has none.
    fn configure(&self) -> Result<()>;

    /// Fail with `ConfigMismatch` if a different marker is persisted. A store
    /// with no marker yet passes.
    fn check_config(&self) -> Result<()>;

    fn exists(&self, id: &ObjectId) -> Result<bool>;

    /// Every stored id whose hex form starts with `partial_id`.
    ///
    /// Fails with `InvalidArgument` if `partial_id` is shorter than eight
    /// characters or is not hex. No match is an empty result, not an error.
    fn lookup(&self, partial_id: &str) -> Result<Vec<ObjectId>>;

    fn get_if_present(&self, id: &ObjectId) -> Result<Option<RevObject>>;

    /// Store an object under its id. Returns `true` if it was not stored yet.
    fn put(&self, object: &RevObject) -> Result<bool>;

    /// Returns `true` if the object existed.
    fn delete(&self, id: &ObjectId) -> Result<bool>;

    /// Like [`get_if_present`](Self::get_if_present), failing with `NotFound` when absent.
    fn get(&self, id: &ObjectId) -> Result<RevObject> {
        self.get_if_present(id)?.ok_or(StoreError::NotFound(*id))
    }

    /// Fetch and narrow to one object type.
    fn get_as<T: RevVariant>(&self, id: &ObjectId) -> Result<T>
    where
        Self: Sized,
    {
        self.get(id)?.narrow(*id)
    }

    /// Fetch and narrow to one object type; absent is `Ok(None)`.
    fn get_if_present_as<T: RevVariant>(&self, id: &ObjectId) -> Result<Option<T>>
    where
        Self: Sized,
    {
        self.get_if_present(id)?
            .map(|object| object.narrow(*id))
            .transpose()
    }

    fn get_commit(&self, id: &ObjectId) -> Result<RevCommit> {
        self.get(id)?.narrow(*id)
    }

    fn get_tree(&self, id: &ObjectId) -> Result<RevTree> {
        self.get(id)?.narrow(*id)
    }

    fn get_feature(&self, id: &ObjectId) -> Result<RevFeature> {
        self.get(id)?.narrow(*id)
    }

    fn get_feature_type(&self, id: &ObjectId) -> Result<RevFeatureType> {
        self.get(id)?.narrow(*id)
    }

    fn get_tag(&self, id: &ObjectId) -> Result<RevTag> {
        self.get(id)?.narrow(*id)
    }

    /// Lazily fetch many objects.
    ///
    /// Yields exactly one `Found` or `NotFound` outcome per input id, in
    /// input order. Nothing is read until the iterator advances.
    fn get_all<I>(&self, ids: I) -> GetAll<'_, Self, I::IntoIter>
    where
        Self: Sized,
        I: IntoIterator<Item = ObjectId>,
    {
        GetAll::new(self, ids.into_iter())
    }

    /// Store many objects, one transaction each.
    ///
    /// Returns an `Inserted` outcome for every object that was newly written.
    fn put_all<I>(&self, objects: I) -> Result<Vec<BulkOutcome>>
    where
        Self: Sized,
        I: IntoIterator<Item = RevObject>,
    {
        let mut outcomes = Vec::new();
        for object in objects {
            if self.put(&object)? {
                outcomes.push(BulkOutcome::Inserted(object.id()?));
            }
        }
        Ok(outcomes)
    }

    /// Delete many objects, one transaction each.
    ///
    /// Returns a `Deleted` outcome for every id that was actually removed.
    fn delete_all<I>(&self, ids: I) -> Result<Vec<BulkOutcome>>
    where
        Self: Sized,
        I: IntoIterator<Item = ObjectId>,
    {
        let mut outcomes = Vec::new();
        for id in ids {
            if self.delete(&id)? {
                outcomes.push(BulkOutcome::Deleted(id));
            }
        }
        Ok(outcomes)
    }
}
