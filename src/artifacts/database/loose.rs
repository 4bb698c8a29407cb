//! Loose object backend
//!
//! Every object is a zlib-compressed file at `objects/XX/YYYY...`, holding the
//! canonical header followed by the payload. New objects are written to a
//! temporary file in the same directory and renamed into place.

use crate::artifacts::core::temp_name;
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::{ObjectId, ObjectIdPrefix};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// Upper bound on the size of `"<kind> <size>\0"`
const MAX_HEADER_LENGTH: u64 = 32;

#[derive(Debug, Clone)]
pub struct LooseStore {
    path: PathBuf,
}

fn not_found_as_none<T>(result: io::Result<T>, path: &Path) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

impl LooseStore {
    pub fn new(objects_path: impl Into<PathBuf>) -> Self {
        LooseStore {
            path: objects_path.into(),
        }
    }

    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.path.join(oid.to_path())
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    pub fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>> {
        let object_path = self.object_path(oid);
        let Some(compressed) = not_found_as_none(std::fs::read(&object_path), &object_path)? else {
            return Ok(None);
        };
        let corrupt = |reason: String| Error::corrupt(object_path.display().to_string(), reason);

        let mut content = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut content)
            .map_err(|e| corrupt(format!("unable to decompress: {e}")))?;

        let mut reader = Cursor::new(content.as_slice());
        let (kind, size) = ObjectType::parse_header(&mut reader)
            .map_err(|e| corrupt(format!("unreadable header: {e}")))?;
        let payload_start = reader.position() as usize;
        if (content.len() - payload_start) as u64 != size {
            return Err(corrupt(format!(
                "declared size {size} but found {} bytes",
                content.len() - payload_start
            )));
        }

        if ObjectId::hash(&content) != *oid {
            return Err(corrupt(format!("content does not hash to {oid}")));
        }

        let data = Bytes::from(content).slice(payload_start..);
        Ok(Some(RawObject::new(kind, data)))
    }

    /// Inflate only as much of the object as its header needs
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, u64)>> {
        let object_path = self.object_path(oid);
        let Some(file) = not_found_as_none(File::open(&object_path), &object_path)? else {
            return Ok(None);
        };

        let mut reader = BufReader::new(ZlibDecoder::new(file).take(MAX_HEADER_LENGTH));
        ObjectType::parse_header(&mut reader)
            .map(Some)
            .map_err(|e| Error::corrupt(object_path.display().to_string(), e.to_string()))
    }

    pub fn write(&self, raw: &RawObject) -> Result<ObjectId> {
        let mut writer = self.open_writer(raw.kind, raw.len() as u64)?;
        writer.write_all(&raw.data).map_err(|e| Error::io(&self.path, e))?;
        writer.finish()
    }

    /// Start a streaming write of an object whose payload size is known up front
    pub fn open_writer(&self, kind: ObjectType, size: u64) -> Result<ObjectWriter> {
        let temp_path = self.path.join(temp_name("tmp-obj"));
        std::fs::create_dir_all(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;

        let header = format!("{} {}\0", kind.as_str(), size);
        let mut hasher = Sha1::new();
        hasher.update(header.as_bytes());
        let mut encoder = ZlibEncoder::new(file, Compression::default());
        encoder
            .write_all(header.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;

        Ok(ObjectWriter {
            objects_path: self.path.clone(),
            temp_path,
            encoder: Some(encoder),
            hasher,
            declared: size,
            written: 0,
        })
    }

    /// Loose objects whose name starts with `prefix`, at most `limit` of them
    pub fn matching(&self, prefix: &ObjectIdPrefix, limit: usize) -> Result<Vec<ObjectId>> {
        let hex = prefix.to_hex();
        let dirs: Vec<String> = if hex.len() >= 2 {
            vec![hex[..2].to_string()]
        } else {
            (0..=255u8)
                .map(|b| format!("{b:02x}"))
                .filter(|dir| dir.starts_with(&hex))
                .collect()
        };

        let mut found = Vec::new();
        for dir in dirs {
            let dir_path = self.path.join(&dir);
            let Some(entries) = not_found_as_none(std::fs::read_dir(&dir_path), &dir_path)? else {
                continue;
            };
            for entry in entries {
                let entry = entry.map_err(|e| Error::io(&dir_path, e))?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                let Ok(oid) = ObjectId::try_parse(&format!("{dir}{name}")) else {
                    continue;
                };
                if prefix.matches(&oid) {
                    found.push(oid);
                    if found.len() >= limit {
                        return Ok(found);
                    }
                }
            }
        }
        Ok(found)
    }
}

/// Streaming loose-object writer
///
/// Bytes are compressed into a temporary file as they arrive; `finish` checks
/// the declared size and renames the file to its content address.
#[derive(Debug)]
pub struct ObjectWriter {
    objects_path: PathBuf,
    temp_path: PathBuf,
    encoder: Option<ZlibEncoder<File>>,
    hasher: Sha1,
    declared: u64,
    written: u64,
}

impl ObjectWriter {
    pub fn finish(mut self) -> Result<ObjectId> {
        if self.written != self.declared {
            return Err(Error::invalid_spec(format!(
                "object stream declared {} bytes but received {}",
                self.declared, self.written
            )));
        }

        let Some(encoder) = self.encoder.take() else {
            return Err(Error::invalid_spec("object stream already finished"));
        };
        let file = encoder.finish().map_err(|e| Error::io(&self.temp_path, e))?;
        file.sync_all().map_err(|e| Error::io(&self.temp_path, e))?;
        drop(file);

        let oid = ObjectId::from_bytes(self.hasher.clone().finalize().into());
        let object_path = self.objects_path.join(oid.to_path());

        if object_path.exists() {
            std::fs::remove_file(&self.temp_path).map_err(|e| Error::io(&self.temp_path, e))?;
            return Ok(oid);
        }

        if let Some(dir) = object_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        std::fs::rename(&self.temp_path, &object_path).map_err(|e| Error::io(&object_path, e))?;
        tracing::debug!("wrote loose object {}", oid);

        Ok(oid)
    }
}

impl Write for ObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.declared {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write exceeds declared object size",
            ));
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| io::Error::other("object stream already finished"))?;
        let n = encoder.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for ObjectWriter {
    fn drop(&mut self) {
        if self.encoder.take().is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    const HELLO_OID: &str = "ce013625030ba8dba906f756967f9e9ca394464a";

    #[test]
    fn writes_hello_blob_at_content_address() {
        let dir = TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());

        let oid = store.write(&RawObject::new(ObjectType::Blob, "hello\n")).unwrap();
        assert_eq!(oid.to_hex(), HELLO_OID);
        assert!(dir.path().join("ce").join(&HELLO_OID[2..]).is_file());

        let raw = store.read(&oid).unwrap().unwrap();
        assert_eq!(raw.data.as_ref(), b"hello\n");
        assert_eq!(store.read_header(&oid).unwrap(), Some((ObjectType::Blob, 6)));
    }

    #[test]
    fn missing_object_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());
        let oid = ObjectId::try_parse(HELLO_OID).unwrap();

        assert_eq!(store.read(&oid).unwrap(), None);
        assert_eq!(store.read_header(&oid).unwrap(), None);
    }

    #[test]
    fn tampered_object_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());
        let oid = store.write(&RawObject::new(ObjectType::Blob, "hello\n")).unwrap();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"blob 6\0jello\n").unwrap();
        let path = store.object_path(&oid);
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let err = store.read(&oid).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Corrupt);
    }

    #[test]
    fn stream_writer_enforces_declared_size() {
        let dir = TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());

        let mut writer = store.open_writer(ObjectType::Blob, 6).unwrap();
        writer.write_all(b"hel").unwrap();
        writer.write_all(b"lo\n").unwrap();
        assert_eq!(writer.finish().unwrap().to_hex(), HELLO_OID);

        let mut short = store.open_writer(ObjectType::Blob, 10).unwrap();
        short.write_all(b"abc").unwrap();
        assert!(short.finish().is_err());

        let mut long = store.open_writer(ObjectType::Blob, 2).unwrap();
        assert!(long.write_all(b"abc").is_err());
    }

    #[test]
    fn finds_objects_by_short_prefix() {
        let dir = TempDir::new().unwrap();
        let store = LooseStore::new(dir.path());
        let oid = store.write(&RawObject::new(ObjectType::Blob, "hello\n")).unwrap();

        let prefix = ObjectIdPrefix::try_parse("ce0136").unwrap();
        assert_eq!(store.matching(&prefix, 2).unwrap(), vec![oid]);
        let prefix = ObjectIdPrefix::try_parse("c").unwrap();
        assert_eq!(store.matching(&prefix, 2).unwrap(), vec![oid]);
    }
}
