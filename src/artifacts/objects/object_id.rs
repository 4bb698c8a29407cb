//! Git object identifier (SHA-1 hash)
//!
//! Object IDs are 20-byte SHA-1 digests. They uniquely identify all objects
//! (blobs, trees, commits, tags) and have two textual forms:
//!
//! - Full: 40 lowercase hex characters (e.g., "ce0136...464a")
//! - Raw: the 20 digest bytes, as stored inside trees, the index and packs
//!
//! A [`ObjectIdPrefix`] is the abbreviated form: 1 to 40 hex characters
//! denoting any object whose hex name starts with them.
//!
//! ## Storage
//!
//! Loose objects live at `objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{OBJECT_ID_LENGTH, OBJECT_ID_RAW_LENGTH};
use crate::errors::{Error, Result};
use sha1::{Digest, Sha1};
use std::io;
use std::path::PathBuf;

/// Git object identifier (SHA-1 hash)
///
/// Equality, ordering and hashing are byte-wise over the raw digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_RAW_LENGTH]);

impl ObjectId {
    /// The all-zero identifier used by reflogs for "no value".
    pub const ZERO: ObjectId = ObjectId([0; OBJECT_ID_RAW_LENGTH]);

    pub fn from_bytes(bytes: [u8; OBJECT_ID_RAW_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; OBJECT_ID_RAW_LENGTH] = bytes.try_into().map_err(|_| {
            Error::invalid_spec(format!("invalid raw object id length: {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// Parse and validate an object ID from its 40-character hex form
    pub fn try_parse(id: &str) -> Result<Self> {
        if id.len() != OBJECT_ID_LENGTH {
            return Err(Error::invalid_spec(format!(
                "invalid object id length {}: {id}",
                id.len()
            )));
        }

        let mut raw = [0u8; OBJECT_ID_RAW_LENGTH];
        for (i, pair) in id.as_bytes().chunks(2).enumerate() {
            let high = hex_value(pair[0]);
            let low = hex_value(pair[1]);
            match (high, low) {
                (Some(high), Some(low)) => raw[i] = (high << 4) | low,
                _ => {
                    return Err(Error::invalid_spec(format!(
                        "invalid object id characters: {id}"
                    )));
                }
            }
        }

        Ok(Self(raw))
    }

    /// Hash a canonical object serialization (`"<kind> <len>\0" ++ payload`)
    pub fn hash(serialized: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(serialized);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_RAW_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; OBJECT_ID_RAW_LENGTH]
    }

    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(OBJECT_ID_LENGTH);
        for byte in self.0 {
            hex.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            hex.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
        }
        hex
    }

    /// Write the object ID in binary format (20 bytes)
    pub fn write_h40_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    /// Read an object ID from binary format (20 bytes)
    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_RAW_LENGTH];
        reader.read_exact(&mut raw)?;
        Ok(Self(raw))
    }

    /// Convert to file system path for object storage
    ///
    /// Splits the hash as `XX/YYYYYY...` where XX is the first 2 chars.
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// First 7 characters of the hash (standard Git abbreviation)
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_parse(s)
    }
}

/// Abbreviated object ID: the leading `len` hex digits of some object name
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdPrefix {
    bytes: [u8; OBJECT_ID_RAW_LENGTH],
    len: usize,
}

impl ObjectIdPrefix {
    pub fn try_parse(prefix: &str) -> Result<Self> {
        if prefix.is_empty() || prefix.len() > OBJECT_ID_LENGTH {
            return Err(Error::invalid_spec(format!(
                "invalid object id prefix length {}: {prefix}",
                prefix.len()
            )));
        }

        let mut bytes = [0u8; OBJECT_ID_RAW_LENGTH];
        for (i, c) in prefix.bytes().enumerate() {
            let nibble = hex_value(c).ok_or_else(|| {
                Error::invalid_spec(format!("invalid object id prefix characters: {prefix}"))
            })?;
            if i % 2 == 0 {
                bytes[i / 2] = nibble << 4;
            } else {
                bytes[i / 2] |= nibble;
            }
        }

        Ok(Self {
            bytes,
            len: prefix.len(),
        })
    }

    /// Number of hex digits in the prefix
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lowest object ID that carries this prefix
    pub fn min_oid(&self) -> ObjectId {
        ObjectId(self.bytes)
    }

    /// First raw byte, if the prefix spans at least two hex digits
    pub fn first_byte(&self) -> Option<u8> {
        (self.len >= 2).then_some(self.bytes[0])
    }

    pub fn matches(&self, oid: &ObjectId) -> bool {
        let full = self.len / 2;
        if oid.0[..full] != self.bytes[..full] {
            return false;
        }
        if self.len % 2 == 1 {
            return (oid.0[full] & 0xf0) == self.bytes[full];
        }
        true
    }

    pub fn to_hex(&self) -> String {
        let mut hex = ObjectId(self.bytes).to_hex();
        hex.truncate(self.len);
        hex
    }
}

impl std::fmt::Display for ObjectIdPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ObjectIdPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectIdPrefix({})", self.to_hex())
    }
}
