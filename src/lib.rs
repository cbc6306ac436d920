//! # Geostore
//!
//! Storage layer for a versioned geospatial repository: a content-addressed
//! object database plus the config and merge-conflict stores that sit next
//! to it.
//!
//! ## Core Concepts
//!
//! - **Objects**: Immutable commits, trees, features, feature types and tags,
//!   addressed by the SHA-256 of their canonical encoding
//! - **Backends**: The object database is generic over an [`ObjectBackend`];
//!   SQLite and in-memory backends are provided
//! - **Format gate**: Each store records the engine format that wrote it and
//!   refuses to open under a different one
//! - **Transactions**: Every write is its own commit-or-rollback unit
//!
//! ## Example
//!
//! ```ignore
//! use geostore::{ObjectDatabase, RevFeature, RevObject, Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::at("./my-repo"))?;
//!
//! let feature: RevObject = RevFeature::new(vec![]).into();
//! store.objects().put(&feature)?;
//!
//! let id = feature.id()?;
//! let matches = store.objects().lookup(&id.to_hex()[..8])?;
//! assert_eq!(matches, vec![id]);
//! ```

pub mod config;
pub mod configdb;
pub mod conflicts;
pub mod error;
pub mod format;
pub mod import;
pub mod objects;
pub mod odb;
pub mod sqlite;
pub mod store;
pub mod types;

// Re-exports
pub use config::StoreConfig;
pub use configdb::{ConfigDatabase, ConfigEntries};
pub use conflicts::{Conflicts, ConflictsDatabase};
pub use error::{Result, StoreError};
pub use format::{FormatState, VersionedFormat};
pub use import::{
    FeatureSource, FeatureTransform, Features, ImportOp, ImportSummary, MapFeatures,
    NullProgress, ProgressListener,
};
pub use objects::{
    FieldType, FieldValue, Geometry, Node, NodeKind, ObjectCodec, ObjectKind,
    PropertyDescriptor, RevCommit, RevFeature, RevFeatureType, RevObject, RevTag, RevTree,
    RevVariant,
};
pub use odb::{
    BackedObjectDatabase, BulkOutcome, GetAll, MemoryBackend, MemoryObjectDatabase,
    ObjectBackend, ObjectDatabase,
};
pub use sqlite::{
    PoolConfig, SqliteConfigDatabase, SqliteConflictsDatabase, SqliteObjectBackend,
    SqliteObjectDatabase,
};
pub use store::Store;
pub use types::*;
