//! Annotated tag object
//!
//! ```text
//! object <target-sha>
//! type <target-kind>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```
//!
//! Very old tags carry no `tagger` line; both forms round-trip.

use crate::artifacts::objects::commit::{parse_hex_oid, parse_header_block, write_header, HeaderBlock};
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::errors::{Error, Result};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    target: ObjectId,
    target_kind: ObjectType,
    name: Vec<u8>,
    tagger: Option<Signature>,
    message: Bytes,
}

impl Tag {
    pub fn new(
        target: ObjectId,
        target_kind: ObjectType,
        name: impl Into<Vec<u8>>,
        tagger: Option<Signature>,
        message: impl Into<Bytes>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(&b'\n') || name.contains(&0) {
            return Err(Error::invalid_spec(format!(
                "invalid tag name {:?}",
                String::from_utf8_lossy(&name)
            )));
        }

        Ok(Tag {
            target,
            target_kind,
            name,
            tagger,
            message: message.into(),
        })
    }

    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_kind(&self) -> ObjectType {
        self.target_kind
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Signature> {
        self.tagger.as_ref()
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }
}

impl Packable for Tag {
    fn serialize(&self) -> Result<Bytes> {
        let mut out = Vec::with_capacity(128 + self.message.len());
        out.extend_from_slice(format!("object {}\n", self.target).as_bytes());
        out.extend_from_slice(format!("type {}\n", self.target_kind).as_bytes());
        write_header(&mut out, b"tag", &self.name);
        if let Some(tagger) = &self.tagger {
            write_header(&mut out, b"tagger", &tagger.encode());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        Ok(Bytes::from(out))
    }
}

impl Unpackable for Tag {
    fn deserialize(payload: Bytes) -> Result<Self> {
        const WHAT: &str = "tag";
        let HeaderBlock { headers, body } = parse_header_block(&payload, WHAT)?;
        let mut headers = headers.into_iter();

        let target = match headers.next() {
            Some((key, value)) if key == b"object" => parse_hex_oid(&value, WHAT)?,
            _ => return Err(Error::corrupt(WHAT, "missing object line")),
        };
        let target_kind = match headers.next() {
            Some((key, value)) if key == b"type" => ObjectType::try_from(value.as_slice())
                .map_err(|_| Error::corrupt(WHAT, "invalid target type"))?,
            _ => return Err(Error::corrupt(WHAT, "missing type line")),
        };
        let name = match headers.next() {
            Some((key, value)) if key == b"tag" && !value.contains(&b'\n') => value,
            _ => return Err(Error::corrupt(WHAT, "missing tag line")),
        };
        let tagger = match headers.next() {
            Some((key, value)) if key == b"tagger" => Some(Signature::parse(&value)?),
            None => None,
            Some(_) => return Err(Error::corrupt(WHAT, "unexpected header")),
        };
        if headers.next().is_some() {
            return Err(Error::corrupt(WHAT, "unexpected header"));
        }

        Ok(Tag {
            target,
            target_kind,
            name,
            tagger,
            message: body,
        })
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }
}
