//! Object databases: content-addressed storage of revision objects.

mod bulk;
mod database;
mod memory;
mod traits;

pub use bulk::{BulkOutcome, GetAll};
pub use database::BackedObjectDatabase;
pub use memory::MemoryBackend;
pub use traits::{ObjectBackend, ObjectDatabase};

/// Object database kept entirely in memory.
pub type MemoryObjectDatabase = BackedObjectDatabase<MemoryBackend>;
