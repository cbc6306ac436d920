//! Heap-backed object storage, for tests and scratch repositories.

use super::traits::ObjectBackend;
use crate::error::Result;
use crate::types::ObjectId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

type Objects = Arc<Mutex<BTreeMap<ObjectId, Vec<u8>>>>;

/// Keeps encoded objects in a shared map.
///
/// Clones share the same map, so data outlives any one database instance
/// for as long as a clone of the backend is alive. The location is ignored.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    objects: Objects,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Overwrite the raw bytes stored under `id`.
    pub fn insert_raw(&self, id: ObjectId, bytes: Vec<u8>) {
        self.objects.lock().insert(id, bytes);
    }
}

impl ObjectBackend for MemoryBackend {
    type Connection = Objects;

    fn connect(&self, _location: &Path) -> Result<Self::Connection> {
        Ok(Arc::clone(&self.objects))
    }

    fn close(&self, _conn: Self::Connection) -> Result<()> {
        Ok(())
    }

    fn init(&self, _conn: &mut Self::Connection) -> Result<()> {
        Ok(())
    }

    fn has(&self, conn: &mut Self::Connection, id: &ObjectId) -> Result<bool> {
        Ok(conn.lock().contains_key(id))
    }

    fn search(&self, conn: &mut Self::Connection, prefix: &str) -> Result<Vec<ObjectId>> {
        Ok(conn
            .lock()
            .keys()
            .filter(|id| id.has_hex_prefix(prefix))
            .copied()
            .collect())
    }

    fn get(&self, conn: &mut Self::Connection, id: &ObjectId) -> Result<Option<Vec<u8>>> {
        Ok(conn.lock().get(id).cloned())
    }

    fn put(&self, conn: &mut Self::Connection, id: &ObjectId, bytes: &[u8]) -> Result<bool> {
        let mut objects = conn.lock();
        if objects.contains_key(id) {
            return Ok(false);
        }
        objects.insert(*id, bytes.to_vec());
        Ok(true)
    }

    fn delete(&self, conn: &mut Self::Connection, id: &ObjectId) -> Result<bool> {
        Ok(conn.lock().remove(id).is_some())
    }
}
