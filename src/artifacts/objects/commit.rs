//! Git commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//! They contain:
//! - A tree object ID (directory snapshot)
//! - Parent commit ID(s) (for history, first parent is the mainline)
//! - Author and committer signatures
//! - An optional message encoding and any further opaque headers
//! - The commit message
//!
//! ## Format
//!
//! ```text
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//! encoding <label>
//! <extra-key> <extra-value, continuation lines prefixed by a space>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::errors::{Error, Result};
use bytes::Bytes;

/// Slim representation of a commit
///
/// Contains only what history traversal needs: parents and committer time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    /// The commit's object ID
    pub oid: ObjectId,
    /// The commit's parent object IDs
    pub parents: Vec<ObjectId>,
    /// Committer time in seconds since the epoch
    pub timestamp: i64,
}

/// Git commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Tree object ID representing the directory snapshot
    tree_oid: ObjectId,
    /// Parent commit IDs (empty for a root commit, several for merges)
    parents: Vec<ObjectId>,
    /// Author who wrote the changes
    author: Signature,
    /// Committer who recorded the commit
    committer: Signature,
    /// Declared text encoding of the message
    encoding: Option<String>,
    /// Headers this crate does not interpret, in order (e.g. `gpgsig`)
    extra_headers: Vec<(Vec<u8>, Vec<u8>)>,
    /// Commit message
    message: Bytes,
}

impl Commit {
    pub fn new(
        tree_oid: ObjectId,
        parents: Vec<ObjectId>,
        author: Signature,
        committer: Signature,
        message: impl Into<Bytes>,
    ) -> Self {
        Commit {
            tree_oid,
            parents,
            author,
            committer,
            encoding: None,
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Result<Self> {
        let encoding = encoding.into();
        if encoding.is_empty() || !encoding.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::invalid_spec(format!(
                "invalid message encoding label: {encoding:?}"
            )));
        }
        self.encoding = Some(encoding);
        Ok(self)
    }

    pub fn with_extra_header(
        mut self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let key = key.into();
        if key.is_empty() || key.iter().any(|b| matches!(b, b' ' | b'\n' | 0)) {
            return Err(Error::invalid_spec(format!(
                "invalid commit header name: {:?}",
                String::from_utf8_lossy(&key)
            )));
        }
        if STANDARD_HEADERS.contains(&key.as_slice()) {
            return Err(Error::invalid_spec(format!(
                "commit header {:?} is not an extra header",
                String::from_utf8_lossy(&key)
            )));
        }
        self.extra_headers.push((key, value.into()));
        Ok(self)
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// First parent, the mainline
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn extra_headers(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.extra_headers
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// First line of the commit message
    pub fn short_message(&self) -> &[u8] {
        self.message
            .split(|&b| b == b'\n')
            .next()
            .unwrap_or_default()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            timestamp: self.committer.time(),
        }
    }
}

const STANDARD_HEADERS: [&[u8]; 5] = [b"tree", b"parent", b"author", b"committer", b"encoding"];

impl Packable for Commit {
    fn serialize(&self) -> Result<Bytes> {
        let mut out = Vec::with_capacity(256 + self.message.len());

        out.extend_from_slice(format!("tree {}\n", self.tree_oid).as_bytes());
        for parent in &self.parents {
            out.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }
        write_header(&mut out, b"author", &self.author.encode());
        write_header(&mut out, b"committer", &self.committer.encode());
        if let Some(encoding) = &self.encoding {
            write_header(&mut out, b"encoding", encoding.as_bytes());
        }
        for (key, value) in &self.extra_headers {
            write_header(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);

        Ok(Bytes::from(out))
    }
}

/// Write `key value\n`, continuing multi-line values with a leading space
pub(crate) fn write_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for &byte in value {
        out.push(byte);
        if byte == b'\n' {
            out.push(b' ');
        }
    }
    out.push(b'\n');
}

/// Header block of a commit or tag: ordered (key, value) pairs plus the body
pub(crate) struct HeaderBlock {
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub body: Bytes,
}

/// Split a payload into headers and body, folding continuation lines
pub(crate) fn parse_header_block(payload: &Bytes, what: &str) -> Result<HeaderBlock> {
    let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = payload[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .ok_or_else(|| Error::corrupt(what, "unterminated header block"))?;
        let line = &payload[pos..line_end];
        pos = line_end + 1;

        if line.is_empty() {
            break;
        }

        if let Some(continuation) = line.strip_prefix(b" ") {
            let (_, value) = headers
                .last_mut()
                .ok_or_else(|| Error::corrupt(what, "continuation line without header"))?;
            value.push(b'\n');
            value.extend_from_slice(continuation);
            continue;
        }

        let split = line
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| Error::corrupt(what, "header line without value"))?;
        headers.push((line[..split].to_vec(), line[split + 1..].to_vec()));
    }

    Ok(HeaderBlock {
        headers,
        body: payload.slice(pos..),
    })
}

pub(crate) fn parse_hex_oid(value: &[u8], what: &str) -> Result<ObjectId> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|hex| ObjectId::try_parse(hex).ok())
        .filter(|_| value.iter().all(|b| !b.is_ascii_uppercase()))
        .ok_or_else(|| Error::corrupt(what, "invalid object id"))
}

impl Unpackable for Commit {
    fn deserialize(payload: Bytes) -> Result<Self> {
        const WHAT: &str = "commit";
        let HeaderBlock { headers, body } = parse_header_block(&payload, WHAT)?;
        let mut headers = headers.into_iter().peekable();

        let tree_oid = match headers.next() {
            Some((key, value)) if key == b"tree" => parse_hex_oid(&value, WHAT)?,
            _ => return Err(Error::corrupt(WHAT, "missing tree line")),
        };

        let mut parents = Vec::new();
        while let Some((_, value)) = headers.next_if(|(key, _)| key == b"parent") {
            parents.push(parse_hex_oid(&value, WHAT)?);
        }

        let author = match headers.next() {
            Some((key, value)) if key == b"author" => Signature::parse(&value)?,
            _ => return Err(Error::corrupt(WHAT, "missing author line")),
        };
        let committer = match headers.next() {
            Some((key, value)) if key == b"committer" => Signature::parse(&value)?,
            _ => return Err(Error::corrupt(WHAT, "missing committer line")),
        };

        let encoding = match headers.next_if(|(key, _)| key == b"encoding") {
            Some((_, value)) => Some(
                String::from_utf8(value)
                    .ok()
                    .filter(|label| !label.is_empty() && label.bytes().all(|b| b.is_ascii_graphic()))
                    .ok_or_else(|| Error::corrupt(WHAT, "invalid encoding label"))?,
            ),
            None => None,
        };

        let mut extra_headers = Vec::new();
        for (key, value) in headers {
            if STANDARD_HEADERS.contains(&key.as_slice()) {
                return Err(Error::corrupt(
                    WHAT,
                    format!("misplaced {} header", String::from_utf8_lossy(&key)),
                ));
            }
            extra_headers.push((key, value));
        }

        Ok(Commit {
            tree_oid,
            parents,
            author,
            committer,
            encoding,
            extra_headers,
            message: body,
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}
