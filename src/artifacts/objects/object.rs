use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{Error, Result};
use bytes::Bytes;
use sha1::{Digest, Sha1};

/// Encode a typed object into its canonical payload (without the header)
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Decode a typed object from its payload (the header has already been read)
pub trait Unpackable {
    fn deserialize(payload: Bytes) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn object_id(&self) -> Result<ObjectId> {
        let payload = self.serialize()?;
        Ok(hash_object(self.object_type(), &payload))
    }
}

/// Digest of `"<kind> <len>\0" ++ payload`
pub fn hash_object(kind: ObjectType, payload: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(kind.header(payload.len()));
    hasher.update(payload);
    ObjectId::from_bytes(hasher.finalize().into())
}

/// Untyped object as stored in the database: a kind and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectType,
    pub data: Bytes,
}

impl RawObject {
    pub fn new(kind: ObjectType, data: impl Into<Bytes>) -> Self {
        RawObject {
            kind,
            data: data.into(),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        hash_object(self.kind, &self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A decoded object of any kind; callers pattern-match on the variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    Tag(Box<Tag>),
}

impl ObjectBox {
    pub fn parse(raw: RawObject) -> Result<Self> {
        Ok(match raw.kind {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(raw.data)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(raw.data)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(raw.data)?)),
            ObjectType::Tag => ObjectBox::Tag(Box::new(Tag::deserialize(raw.data)?)),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn into_commit(self) -> Result<Commit> {
        match self {
            ObjectBox::Commit(commit) => Ok(*commit),
            other => Err(mismatch(ObjectType::Commit, other.object_type())),
        }
    }

    pub fn into_tree(self) -> Result<Tree> {
        match self {
            ObjectBox::Tree(tree) => Ok(*tree),
            other => Err(mismatch(ObjectType::Tree, other.object_type())),
        }
    }

    pub fn into_blob(self) -> Result<Blob> {
        match self {
            ObjectBox::Blob(blob) => Ok(*blob),
            other => Err(mismatch(ObjectType::Blob, other.object_type())),
        }
    }

    pub fn into_tag(self) -> Result<Tag> {
        match self {
            ObjectBox::Tag(tag) => Ok(*tag),
            other => Err(mismatch(ObjectType::Tag, other.object_type())),
        }
    }
}

fn mismatch(expected: ObjectType, actual: ObjectType) -> Error {
    Error::invalid_spec(format!("expected a {expected} object but found a {actual}"))
}
