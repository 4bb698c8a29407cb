//! Index extensions
//!
//! An extension is a 4-byte signature, a 4-byte big-endian length and a
//! payload. Signatures starting with an uppercase letter are optional: a
//! reader that does not understand them keeps the bytes and writes them back.
//! Any other unknown signature makes the index unreadable.

use crate::errors::{Error, Result};
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use bytes::Bytes;

/// Cached tree extension
pub const TREE: &[u8; 4] = b"TREE";
/// Untracked cache extension
pub const UNTRACKED: &[u8; 4] = b"UNTR";

/// Extensions describing the entries themselves; stale once entries change
const ENTRY_CACHES: [&[u8; 4]; 2] = [TREE, UNTRACKED];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub signature: [u8; 4],
    pub data: Bytes,
}

impl Extension {
    pub fn is_optional(&self) -> bool {
        self.signature[0].is_ascii_uppercase()
    }

    /// Whether the extension must be dropped once entries change
    pub fn invalidated_by_mutation(&self) -> bool {
        ENTRY_CACHES.contains(&&self.signature)
    }

    pub fn signature_lossy(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.signature);
        out.write_u32::<NetworkEndian>(self.data.len() as u32)?;
        out.extend_from_slice(&self.data);
        Ok(())
    }

    /// Read every extension in `data` (the bytes between the last entry and
    /// the trailing checksum)
    pub fn decode_all(data: &[u8]) -> Result<Vec<Extension>> {
        let mut extensions = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let header = data
                .get(pos..pos + 8)
                .ok_or_else(|| Error::corrupt("index", "truncated extension header"))?;
            let mut signature = [0u8; 4];
            signature.copy_from_slice(&header[..4]);
            let len = NetworkEndian::read_u32(&header[4..8]) as usize;

            let payload = data
                .get(pos + 8..pos + 8 + len)
                .ok_or_else(|| Error::corrupt("index", "truncated extension payload"))?;
            let extension = Extension {
                signature,
                data: Bytes::copy_from_slice(payload),
            };
            if !extension.is_optional() {
                return Err(Error::corrupt(
                    "index",
                    format!(
                        "unsupported mandatory extension {}",
                        extension.signature_lossy()
                    ),
                ));
            }

            extensions.push(extension);
            pos += 8 + len;
        }

        Ok(extensions)
    }
}
