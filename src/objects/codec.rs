//! Binary encoding of revision objects.
//!
//! Stored frame layout:
//!
//! ```text
//! +------------+----------+------------------+-----------------+
//! | generation | kind tag | body             | crc32 (LE, u32) |
//! |     u8     |    u8    | codec-specific   | over all before |
//! +------------+----------+------------------+-----------------+
//! ```
//!
//! The object id never depends on the codec generation: it is the SHA-256 of
//! the kind tag followed by the generation 1 (MessagePack) body. A frame
//! written by any generation therefore decodes to an object with the same id.

use super::model::{
    ObjectKind, RevCommit, RevFeature, RevFeatureType, RevObject, RevTag, RevTree,
};
use crate::error::{Result, StoreError};
use crate::types::ObjectId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Bytes of header preceding the body.
const HEADER_LEN: usize = 2;

/// Bytes of trailing checksum.
const CHECKSUM_LEN: usize = 4;

/// Generation byte of [`MessagePackCodec`].
pub const MESSAGE_PACK_GENERATION: u8 = 1;

/// Generation byte of [`JsonCodec`].
pub const JSON_GENERATION: u8 = 2;

/// Encoder/decoder for one codec generation.
pub trait ObjectCodec: Send + Sync {
    /// Generation byte written at the front of every frame.
    fn generation(&self) -> u8;

    /// Encode only the body (no header, no checksum).
    fn encode_body(&self, object: &RevObject) -> Result<Vec<u8>>;

    /// Decode a body known to hold an object of `kind`.
    fn decode_body(&self, kind: ObjectKind, body: &[u8]) -> std::result::Result<RevObject, String>;

    /// Encode a complete frame.
    fn encode(&self, object: &RevObject) -> Result<Vec<u8>> {
        let body = self.encode_body(object)?;
        let mut frame = Vec::with_capacity(HEADER_LEN + body.len() + CHECKSUM_LEN);
        frame.push(self.generation());
        frame.push(object.kind().tag());
        frame.extend_from_slice(&body);
        let checksum = crc32fast::hash(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());
        Ok(frame)
    }
}

/// Serde data format used for codec bodies.
pub trait BodyFormat: Send + Sync + 'static {
    const GENERATION: u8;

    fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>>;

    fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, String>;
}

/// MessagePack bodies (structs as arrays). This is the canonical form.
pub struct MessagePack;

impl BodyFormat for MessagePack {
    const GENERATION: u8 = MESSAGE_PACK_GENERATION;

    fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(value)?)
    }

    fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, String> {
        rmp_serde::from_slice(bytes).map_err(|e| e.to_string())
    }
}

/// JSON bodies.
pub struct Json;

impl BodyFormat for Json {
    const GENERATION: u8 = JSON_GENERATION;

    fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }
}

/// [`ObjectCodec`] over any [`BodyFormat`].
pub struct FormatCodec<F: BodyFormat>(PhantomData<F>);

impl<F: BodyFormat> FormatCodec<F> {
    pub const fn new() -> Self {
        FormatCodec(PhantomData)
    }
}

impl<F: BodyFormat> Default for FormatCodec<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: BodyFormat> ObjectCodec for FormatCodec<F> {
    fn generation(&self) -> u8 {
        F::GENERATION
    }

    fn encode_body(&self, object: &RevObject) -> Result<Vec<u8>> {
        match object {
            RevObject::Commit(c) => F::to_vec(c),
            RevObject::Tree(t) => F::to_vec(t),
            RevObject::Feature(f) => F::to_vec(f),
            RevObject::FeatureType(ft) => F::to_vec(ft),
            RevObject::Tag(t) => F::to_vec(t),
        }
    }

    fn decode_body(&self, kind: ObjectKind, body: &[u8]) -> std::result::Result<RevObject, String> {
        Ok(match kind {
            ObjectKind::Commit => RevObject::Commit(F::from_slice::<RevCommit>(body)?),
            ObjectKind::Tree => RevObject::Tree(F::from_slice::<RevTree>(body)?),
            ObjectKind::Feature => RevObject::Feature(F::from_slice::<RevFeature>(body)?),
            ObjectKind::FeatureType => {
                RevObject::FeatureType(F::from_slice::<RevFeatureType>(body)?)
            }
            ObjectKind::Tag => RevObject::Tag(F::from_slice::<RevTag>(body)?),
        })
    }
}

/// Generation 1 codec, also the canonical form used for ids.
pub type MessagePackCodec = FormatCodec<MessagePack>;

/// Generation 2 codec. Human-readable, cannot represent non-finite doubles.
pub type JsonCodec = FormatCodec<Json>;

pub static MESSAGE_PACK_CODEC: MessagePackCodec = FormatCodec::new();

pub static JSON_CODEC: JsonCodec = FormatCodec::new();

/// Look up the codec for a generation byte.
pub fn codec_for(generation: u8) -> Option<&'static dyn ObjectCodec> {
    match generation {
        MESSAGE_PACK_GENERATION => Some(&MESSAGE_PACK_CODEC),
        JSON_GENERATION => Some(&JSON_CODEC),
        _ => None,
    }
}

/// Content address of an object.
pub fn object_id(object: &RevObject) -> Result<ObjectId> {
    let body = MESSAGE_PACK_CODEC.encode_body(object)?;
    Ok(canonical_id(object.kind(), &body))
}

fn canonical_id(kind: ObjectKind, canonical_body: &[u8]) -> ObjectId {
    ObjectId::from_parts(&[&[kind.tag()], canonical_body])
}

/// Decode a stored frame of any known generation and verify that it is the
/// object addressed by `id`.
pub fn decode(id: ObjectId, frame: &[u8]) -> Result<RevObject> {
    let corrupt = |reason: String| StoreError::Deserialization { id, reason };

    if frame.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(corrupt(format!("frame too short ({} bytes)", frame.len())));
    }

    let (payload, checksum_bytes) = frame.split_at(frame.len() - CHECKSUM_LEN);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(checksum_bytes);
    let stored = u32::from_le_bytes(stored);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(StoreError::ChecksumMismatch {
            expected: stored,
            got: computed,
        });
    }

    let generation = payload[0];
    let codec = codec_for(generation)
        .ok_or_else(|| corrupt(format!("unknown codec generation {generation}")))?;
    let kind = ObjectKind::from_tag(payload[1])
        .ok_or_else(|| corrupt(format!("unknown object tag {}", payload[1])))?;
    let body = &payload[HEADER_LEN..];

    let object = codec.decode_body(kind, body).map_err(corrupt)?;

    let actual = if generation == MESSAGE_PACK_GENERATION {
        canonical_id(kind, body)
    } else {
        object_id(&object)?
    };
    if actual != id {
        return Err(StoreError::HashMismatch {
            expected: id,
            got: actual,
        });
    }

    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::model::{FieldValue, Geometry, Node};
    use crate::types::{Person, Timestamp};
    use proptest::prelude::*;

    fn sample_commit() -> RevObject {
        RevCommit::new(
            ObjectId::from_bytes(b"tree"),
            vec![ObjectId::from_bytes(b"parent")],
            Person::new("Ada", "ada@example.com", Timestamp(1_700_000_000_000)),
            "import roads",
        )
        .into()
    }

    #[test]
    fn test_same_content_same_id() {
        let a = sample_commit();
        let b = sample_commit();
        assert_eq!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn test_kind_participates_in_id() {
        // An empty tree and an empty feature could share a body; the tag keeps them apart.
        let tree: RevObject = RevTree::empty().into();
        let feature: RevObject = RevFeature::new(vec![]).into();
        assert_ne!(tree.id().unwrap(), feature.id().unwrap());
    }

    #[test]
    fn test_generations_share_ids() {
        let object: RevObject = RevTree::new(
            vec![Node::tree("roads", ObjectId::from_bytes(b"sub"))],
            vec![Node::feature("poi.1", ObjectId::from_bytes(b"f"))],
        )
        .into();
        let id = object.id().unwrap();

        let packed = MESSAGE_PACK_CODEC.encode(&object).unwrap();
        let json = JSON_CODEC.encode(&object).unwrap();
        assert_eq!(packed[0], MESSAGE_PACK_GENERATION);
        assert_eq!(json[0], JSON_GENERATION);

        assert_eq!(decode(id, &packed).unwrap(), object);
        assert_eq!(decode(id, &json).unwrap(), object);
    }

    #[test]
    fn test_corrupt_frame_is_rejected() {
        let object = sample_commit();
        let id = object.id().unwrap();
        let mut frame = MESSAGE_PACK_CODEC.encode(&object).unwrap();
        let middle = frame.len() / 2;
        frame[middle] ^= 0xff;

        let err = decode(id, &frame).unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
        assert!(err.is_serialization());
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let id = ObjectId::from_bytes(b"x");
        let err = decode(id, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, StoreError::Deserialization { .. }));
    }

    #[test]
    fn test_wrong_id_is_rejected() {
        let object = sample_commit();
        let frame = MESSAGE_PACK_CODEC.encode(&object).unwrap();
        let other = ObjectId::from_bytes(b"someone else");

        let err = decode(other, &frame).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { expected, .. } if expected == other));
    }

    #[test]
    fn test_unknown_generation_is_rejected() {
        let object = sample_commit();
        let id = object.id().unwrap();
        let mut frame = MESSAGE_PACK_CODEC.encode(&object).unwrap();
        frame[0] = 9;
        let len = frame.len();
        let checksum = crc32fast::hash(&frame[..len - CHECKSUM_LEN]);
        frame[len - CHECKSUM_LEN..].copy_from_slice(&checksum.to_le_bytes());

        let err = decode(id, &frame).unwrap_err();
        assert!(matches!(err, StoreError::Deserialization { .. }));
    }

    fn field_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            Just(FieldValue::Null),
            any::<bool>().prop_map(FieldValue::Bool),
            any::<i64>().prop_map(FieldValue::Int),
            (-1.0e9f64..1.0e9).prop_map(FieldValue::Double),
            "[a-zA-Z0-9 ]{0,16}".prop_map(FieldValue::String),
            (proptest::option::of(any::<u32>()), proptest::collection::vec(any::<u8>(), 0..32))
                .prop_map(|(srid, wkb)| FieldValue::Geometry(Geometry { srid, wkb })),
        ]
    }

    proptest! {
        #[test]
        fn prop_features_decode_under_their_id(
            values in proptest::collection::vec(field_value(), 0..8)
        ) {
            let object: RevObject = RevFeature::new(values).into();
            let id = object.id().unwrap();
            let frame = MESSAGE_PACK_CODEC.encode(&object).unwrap();
            prop_assert_eq!(decode(id, &frame).unwrap(), object);
        }

        #[test]
        fn prop_distinct_strings_distinct_ids(a in "[a-z]{1,12}", b in "[a-z]{1,12}") {
            prop_assume!(a != b);
            let fa: RevObject = RevFeature::new(vec![FieldValue::String(a)]).into();
            let fb: RevObject = RevFeature::new(vec![FieldValue::String(b)]).into();
            prop_assert_ne!(fa.id().unwrap(), fb.id().unwrap());
        }
    }
}
