//! Backend-agnostic implementation of the object database contract.

use super::traits::{ObjectBackend, ObjectDatabase};
use crate::configdb::ConfigDatabase;
use crate::error::{Result, StoreError};
use crate::format::{VersionedFormat, OBJECTS_STORAGE};
use crate::objects::codec::{self, ObjectCodec, MESSAGE_PACK_CODEC};
use crate::objects::RevObject;
use crate::types::{ObjectId, MIN_PARTIAL_ID_LEN, OBJECT_ID_LEN};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Object database over any [`ObjectBackend`].
///
/// Owns a single backend connection, created by [`open`](ObjectDatabase::open)
/// and released by [`close`](ObjectDatabase::close). Calls on a closed
/// database fail with `NotOpen`.
pub struct BackedObjectDatabase<B: ObjectBackend> {
    backend: B,

    /// Where the backend keeps its data.
    location: PathBuf,

    /// Holds the format marker.
    config: Arc<dyn ConfigDatabase>,

    /// Format marker this engine writes and expects.
    format: VersionedFormat,

    /// Codec used for writing. Reads accept every known generation.
    codec: &'static dyn ObjectCodec,

    read_only: bool,

    conn: Mutex<Option<B::Connection>>,

    /// Recently decoded objects.
    cache: Option<Mutex<LruCache<ObjectId, RevObject>>>,
}

impl<B: ObjectBackend> BackedObjectDatabase<B> {
    pub fn new(
        backend: B,
        location: impl AsRef<Path>,
        config: Arc<dyn ConfigDatabase>,
        format: VersionedFormat,
    ) -> Self {
        Self {
            backend,
            location: location.as_ref().to_path_buf(),
            config,
            format,
            codec: &MESSAGE_PACK_CODEC,
            read_only: false,
            conn: Mutex::new(None),
            cache: None,
        }
    }

    /// Reject every mutating call with `ReadOnly`.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Write new objects with `codec` instead of the default MessagePack codec.
    pub fn with_codec(mut self, codec: &'static dyn ObjectCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Keep up to `size` decoded objects in memory. Zero disables caching.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache = NonZeroUsize::new(size).map(|n| Mutex::new(LruCache::new(n)));
        self
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn format(&self) -> &VersionedFormat {
        &self.format
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn with_conn<T>(&self, f: impl FnOnce(&B, &mut B::Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotOpen)?;
        f(&self.backend, conn)
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn cached(&self, id: &ObjectId) -> Option<RevObject> {
        self.cache.as_ref()?.lock().get(id).cloned()
    }

    fn remember(&self, id: ObjectId, object: &RevObject) {
        if let Some(cache) = &self.cache {
            cache.lock().put(id, object.clone());
        }
    }

    fn forget(&self, id: &ObjectId) {
        if let Some(cache) = &self.cache {
            cache.lock().pop(id);
        }
    }
}

impl<B: ObjectBackend> ObjectDatabase for BackedObjectDatabase<B> {
    fn open(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        if guard.is_some() {
            return Ok(());
        }

        let mut conn = self.backend.connect(&self.location)?;
        if let Err(e) = self.backend.init(&mut conn) {
            if let Err(close) = self.backend.close(conn) {
                warn!(error = %close, "failed to close connection after init failure");
            }
            return Err(e);
        }

        debug!(location = %self.location.display(), "opened object database");
        *guard = Some(conn);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let conn = self.conn.lock().take();
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
        match conn {
            Some(conn) => {
                debug!(location = %self.location.display(), "closing object database");
                self.backend.close(conn)
            }
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn configure(&self) -> Result<()> {
        self.format.configure(OBJECTS_STORAGE, self.config.as_ref())
    }

    fn check_config(&self) -> Result<()> {
        self.format.verify(OBJECTS_STORAGE, self.config.as_ref())
    }

    fn exists(&self, id: &ObjectId) -> Result<bool> {
        self.with_conn(|backend, conn| backend.has(conn, id))
    }

    fn lookup(&self, partial_id: &str) -> Result<Vec<ObjectId>> {
        if partial_id.len() < MIN_PARTIAL_ID_LEN {
            return Err(StoreError::InvalidArgument(format!(
                "partial id must be at least {MIN_PARTIAL_ID_LEN} characters long: {partial_id}"
            )));
        }
        if !partial_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidArgument(format!(
                "partial id is not hexadecimal: {partial_id}"
            )));
        }
        if partial_id.len() > OBJECT_ID_LEN * 2 {
            return Ok(Vec::new());
        }

        let prefix = partial_id.to_ascii_lowercase();
        self.with_conn(|backend, conn| backend.search(conn, &prefix))
    }

    fn get_if_present(&self, id: &ObjectId) -> Result<Option<RevObject>> {
        // Other instances may share the location, so a hit only counts while
        // the row still exists.
        if let Some(object) = self.cached(id) {
            if self.with_conn(|backend, conn| backend.has(conn, id))? {
                return Ok(Some(object));
            }
            self.forget(id);
            return Ok(None);
        }

        let Some(bytes) = self.with_conn(|backend, conn| backend.get(conn, id))? else {
            return Ok(None);
        };
        let object = codec::decode(*id, &bytes)?;
        self.remember(*id, &object);
        Ok(Some(object))
    }

    fn put(&self, object: &RevObject) -> Result<bool> {
        self.check_writable()?;

        let id = object.id()?;
        let bytes = self.codec.encode(object)?;
        let inserted = self.with_conn(|backend, conn| backend.put(conn, &id, &bytes))?;
        // An existing row was not rewritten; its bytes are only trusted once decoded.
        if inserted {
            self.remember(id, object);
        }
        Ok(inserted)
    }

    fn delete(&self, id: &ObjectId) -> Result<bool> {
        self.check_writable()?;

        let deleted = self.with_conn(|backend, conn| backend.delete(conn, id))?;
        self.forget(id);
        Ok(deleted)
    }
}

impl<B: ObjectBackend> Drop for BackedObjectDatabase<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close object database on drop");
        }
    }
}
