//! Revision object model and its binary codec.
//!
//! Objects are immutable and addressed by the SHA-256 of their canonical
//! encoding, so writing the same object twice always lands on the same id.

pub mod codec;
mod model;

pub use codec::{
    JsonCodec, MessagePackCodec, ObjectCodec, JSON_CODEC, JSON_GENERATION, MESSAGE_PACK_CODEC,
    MESSAGE_PACK_GENERATION,
};
pub use model::{
    FieldType, FieldValue, Geometry, Node, NodeKind, ObjectKind, PropertyDescriptor, RevCommit,
    RevFeature, RevFeatureType, RevObject, RevTag, RevTree, RevVariant,
};
