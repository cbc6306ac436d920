//! Error types for the storage layer.

use crate::objects::ObjectKind;
use crate::types::ObjectId;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No object with id: {0}")]
    NotFound(ObjectId),

    #[error("Object {id} is a {actual}, expected a {expected}")]
    TypeMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unable to decode object {id}: {reason}")]
    Deserialization { id: ObjectId, reason: String },

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: ObjectId, got: ObjectId },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Transaction rolled back: {0}")]
    Transaction(#[source] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(
        "{storage} database format mismatch: expected {expected}, found {}",
        .found.as_deref().unwrap_or("nothing")
    )]
    ConfigMismatch {
        storage: String,
        expected: String,
        found: Option<String>,
    },

    #[error("Failed to release resource: {0}")]
    ResourceCleanup(String),

    #[error("Database is read-only")]
    ReadOnly,

    #[error("Database is not open")]
    NotOpen,
}

impl StoreError {
    /// Whether this error belongs to the decode/encode family.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            StoreError::Serialization(_)
                | StoreError::Deserialization { .. }
                | StoreError::ChecksumMismatch { .. }
                | StoreError::HashMismatch { .. }
        )
    }

    /// Re-tag a statement failure raised inside a write as a transaction failure.
    pub(crate) fn into_transaction(self) -> Self {
        match self {
            StoreError::Database(e) => StoreError::Transaction(e),
            other => other,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
