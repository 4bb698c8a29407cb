use crate::errors::{Error, Result};
use std::io::BufRead;

/// The four object kinds stored in the object database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
        }
    }

    /// Type code used in pack entry headers
    pub fn pack_code(&self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
        }
    }

    pub fn from_pack_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectType::Commit),
            2 => Some(ObjectType::Tree),
            3 => Some(ObjectType::Blob),
            4 => Some(ObjectType::Tag),
            _ => None,
        }
    }

    /// Canonical object header `"<kind> <len>\0"`
    pub fn header(&self, len: usize) -> Vec<u8> {
        format!("{} {}\0", self.as_str(), len).into_bytes()
    }

    /// Parse an object header (`"<kind> <size>\0"`) from the start of a reader
    ///
    /// Returns the kind and the declared payload size.
    pub fn parse_header(data_reader: &mut impl BufRead) -> Result<(ObjectType, u64)> {
        let mut object_type = Vec::new();
        data_reader.read_until(b' ', &mut object_type)?;
        if object_type.pop() != Some(b' ') {
            return Err(Error::corrupt("object header", "missing kind terminator"));
        }
        let object_type = ObjectType::try_from(object_type.as_slice())?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(Error::corrupt("object header", "missing size terminator"));
        }
        let size = std::str::from_utf8(&size)
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| Error::corrupt("object header", "invalid size"))?;

        Ok((object_type, size))
    }
}

impl TryFrom<&[u8]> for ObjectType {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        match value {
            b"commit" => Ok(ObjectType::Commit),
            b"tree" => Ok(ObjectType::Tree),
            b"blob" => Ok(ObjectType::Blob),
            b"tag" => Ok(ObjectType::Tag),
            _ => Err(Error::corrupt(
                "object header",
                format!("invalid object type {:?}", String::from_utf8_lossy(value)),
            )),
        }
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        ObjectType::try_from(value.as_bytes())
            .map_err(|_| Error::invalid_spec(format!("invalid object type: {value}")))
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
