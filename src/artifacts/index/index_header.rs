use crate::artifacts::index::{HEADER_SIZE, MAX_VERSION, MIN_VERSION, SIGNATURE};
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use derive_new::new;

#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub version: u32,
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(SIGNATURE);
        bytes.write_u32::<NetworkEndian>(self.version)?;
        bytes.write_u32::<NetworkEndian>(self.entries_count)?;
        Ok(bytes)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::corrupt("index", "header truncated"));
        }
        if &bytes[0..4] != SIGNATURE {
            return Err(Error::corrupt("index", "invalid index file signature"));
        }

        let version = NetworkEndian::read_u32(&bytes[4..8]);
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::corrupt(
                "index",
                format!("unsupported index file version {version}"),
            ));
        }
        let entries_count = NetworkEndian::read_u32(&bytes[8..12]);

        Ok(IndexHeader {
            version,
            entries_count,
        })
    }
}
