//! Core types shared by every store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of bytes in an [`ObjectId`].
pub const OBJECT_ID_LEN: usize = 32;

/// Minimum number of hex characters accepted for a partial id lookup.
pub const MIN_PARTIAL_ID_LEN: usize = 8;

/// Content hash addressing an immutable object (SHA-256).
///
/// Ordering and equality are byte-wise, which matches the ordering of the
/// lowercase hex rendering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; OBJECT_ID_LEN]);

impl ObjectId {
    /// The all-zero id. Never produced by hashing real content.
    pub const NULL: ObjectId = ObjectId([0u8; OBJECT_ID_LEN]);

    /// Compute the id of a byte sequence.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ObjectId(hasher.finalize().into())
    }

    /// Compute the id of several byte slices, hashed in order as one stream.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        ObjectId(hasher.finalize().into())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; OBJECT_ID_LEN]
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; OBJECT_ID_LEN] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(ObjectId(arr))
    }

    /// Whether the hex rendering of this id starts with `prefix`.
    ///
    /// `prefix` is compared case-insensitively.
    pub fn has_hex_prefix(&self, prefix: &str) -> bool {
        let hex = self.to_hex();
        hex.len() >= prefix.len() && hex[..prefix.len()].eq_ignore_ascii_case(prefix)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::from_hex(s)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Author, committer or tagger identity attached to history objects.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub email: Option<String>,
    pub timestamp: Timestamp,
    /// Offset from UTC in milliseconds.
    pub tz_offset: i32,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            timestamp,
            tz_offset: 0,
        }
    }

    /// An identity with no name or email.
    pub fn anonymous(timestamp: Timestamp) -> Self {
        Self {
            name: None,
            email: None,
            timestamp,
            tz_offset: 0,
        }
    }
}
