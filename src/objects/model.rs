//! Immutable revision objects.

use crate::error::{Result, StoreError};
use crate::types::{ObjectId, Person, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variant tag of a [`RevObject`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Commit,
    Tree,
    Feature,
    FeatureType,
    Tag,
}

impl ObjectKind {
    /// Tag byte used in stored frames and in id hashing.
    pub fn tag(self) -> u8 {
        match self {
            ObjectKind::Commit => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Feature => 3,
            ObjectKind::FeatureType => 4,
            ObjectKind::Tag => 5,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ObjectKind::Commit),
            2 => Some(ObjectKind::Tree),
            3 => Some(ObjectKind::Feature),
            4 => Some(ObjectKind::FeatureType),
            5 => Some(ObjectKind::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Commit => write!(f, "commit"),
            ObjectKind::Tree => write!(f, "tree"),
            ObjectKind::Feature => write!(f, "feature"),
            ObjectKind::FeatureType => write!(f, "feature type"),
            ObjectKind::Tag => write!(f, "tag"),
        }
    }
}

/// A snapshot of the whole repository tree plus history metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevCommit {
    pub tree_id: ObjectId,
    pub parent_ids: Vec<ObjectId>,
    pub author: Person,
    pub committer: Person,
    pub message: String,
}

impl RevCommit {
    pub fn new(
        tree_id: ObjectId,
        parent_ids: Vec<ObjectId>,
        author: Person,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree_id,
            parent_ids,
            committer: author.clone(),
            author,
            message: message.into(),
        }
    }

    /// First parent, if any.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent_ids.first().copied()
    }
}

/// What a tree [`Node`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Tree,
    Feature,
}

/// Named reference from a tree to a child tree or feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub object_id: ObjectId,
    /// Feature type governing the referenced object, when it differs from the parent's.
    pub metadata_id: Option<ObjectId>,
}

impl Node {
    pub fn tree(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Tree,
            object_id,
            metadata_id: None,
        }
    }

    pub fn feature(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Feature,
            object_id,
            metadata_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata_id: ObjectId) -> Self {
        self.metadata_id = Some(metadata_id);
        self
    }
}

/// Directory-like grouping of features and sub-trees.
///
/// Nodes are kept sorted by name so equal trees always hash equally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevTree {
    /// Number of features reachable from this tree.
    pub size: u64,
    pub trees: Vec<Node>,
    pub features: Vec<Node>,
}

impl RevTree {
    pub fn new(mut trees: Vec<Node>, mut features: Vec<Node>) -> Self {
        trees.sort_by(|a, b| a.name.cmp(&b.name));
        features.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            size: features.len() as u64,
            trees,
            features,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Override the reachable-feature count (sub-tree sizes are not known here).
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty() && self.features.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.trees
            .iter()
            .chain(self.features.iter())
            .find(|node| node.name == name)
    }
}

/// Geometry encoded as well-known binary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub srid: Option<u32>,
    pub wkb: Vec<u8>,
}

/// One attribute value of a feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    Bytes(Vec<u8>),
    Geometry(Geometry),
}

/// A single record of a feature collection: its attribute values in
/// feature-type property order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevFeature {
    pub values: Vec<FieldValue>,
}

impl RevFeature {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }
}

/// Declared type of a feature-type property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    Int,
    Double,
    String,
    Timestamp,
    Bytes,
    Geometry {
        geometry_type: String,
        crs: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub binding: FieldType,
    pub nullable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, binding: FieldType) -> Self {
        Self {
            name: name.into(),
            binding,
            nullable: true,
        }
    }
}

/// Schema shared by the features of one collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevFeatureType {
    pub name: String,
    pub properties: Vec<PropertyDescriptor>,
}

impl RevFeatureType {
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDescriptor>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// The first geometry-typed property.
    pub fn geometry_property(&self) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|p| matches!(p.binding, FieldType::Geometry { .. }))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

/// Named, annotated pointer to a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevTag {
    pub name: String,
    pub commit_id: ObjectId,
    pub message: String,
    pub tagger: Person,
}

/// Any object stored in an object database.
#[derive(Clone, Debug, PartialEq)]
pub enum RevObject {
    Commit(RevCommit),
    Tree(RevTree),
    Feature(RevFeature),
    FeatureType(RevFeatureType),
    Tag(RevTag),
}

impl RevObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            RevObject::Commit(_) => ObjectKind::Commit,
            RevObject::Tree(_) => ObjectKind::Tree,
            RevObject::Feature(_) => ObjectKind::Feature,
            RevObject::FeatureType(_) => ObjectKind::FeatureType,
            RevObject::Tag(_) => ObjectKind::Tag,
        }
    }

    /// Content address of this object.
    pub fn id(&self) -> Result<ObjectId> {
        super::codec::object_id(self)
    }

    /// Narrow to a concrete variant, failing with `TypeMismatch` otherwise.
    ///
    /// `id` is only used to label the error.
    pub fn narrow<T: RevVariant>(self, id: ObjectId) -> Result<T> {
        let actual = self.kind();
        T::from_object(self).ok_or(StoreError::TypeMismatch {
            id,
            expected: T::KIND,
            actual,
        })
    }
}

/// Implemented by each concrete object type so it can be narrowed out of a
/// [`RevObject`].
pub trait RevVariant: Sized + Into<RevObject> {
    const KIND: ObjectKind;

    fn from_object(object: RevObject) -> Option<Self>;
}

macro_rules! rev_variant {
    ($ty:ident, $variant:ident) => {
        impl RevVariant for $ty {
            const KIND: ObjectKind = ObjectKind::$variant;

            fn from_object(object: RevObject) -> Option<Self> {
                match object {
                    RevObject::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for RevObject {
            fn from(inner: $ty) -> Self {
                RevObject::$variant(inner)
            }
        }
    };
}

rev_variant!(RevCommit, Commit);
rev_variant!(RevTree, Tree);
rev_variant!(RevFeature, Feature);
rev_variant!(RevFeatureType, FeatureType);
rev_variant!(RevTag, Tag);
