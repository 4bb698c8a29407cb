//! Pack serialization
//!
//! Objects are written in the order given. Each object is compared with the
//! previous object of the same kind; when a delta against it is small enough
//! the object is stored as a delta, otherwise whole.

use crate::artifacts::core::checksum::Checksum;
use crate::artifacts::database::delta;
use crate::artifacts::database::pack::{OFS_DELTA, PACK_SIGNATURE, PACK_VERSION, REF_DELTA};
use crate::artifacts::database::pack_index::{write_index, IndexRecord};
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Result;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::Write;

/// How delta entries name their base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeltaBase {
    #[default]
    Offset,
    ObjectId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PackWriter {
    deltas: Option<DeltaBase>,
}

/// A finished pack with its index
#[derive(Debug)]
pub struct WrittenPack {
    pub pack: Vec<u8>,
    pub index: Vec<u8>,
    pub checksum: ObjectId,
}

fn entry_header(type_code: u8, size: u64) -> Vec<u8> {
    let mut header = Vec::with_capacity(10);
    let mut byte = (type_code << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest != 0 {
        header.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    header.push(byte);
    header
}

fn ofs_encoding(mut distance: u64) -> Vec<u8> {
    let mut encoded = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance != 0 {
        distance -= 1;
        encoded.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    encoded.reverse();
    encoded
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

impl PackWriter {
    /// Store every object whole
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deltas(base: DeltaBase) -> Self {
        PackWriter { deltas: Some(base) }
    }

    pub fn write(&self, objects: &[RawObject]) -> Result<WrittenPack> {
        let mut out = Checksum::new(Vec::new());
        out.write(PACK_SIGNATURE)?;
        out.write(&PACK_VERSION.to_be_bytes())?;
        out.write(&(objects.len() as u32).to_be_bytes())?;

        let mut records = Vec::with_capacity(objects.len());
        let mut previous: HashMap<ObjectType, (u64, ObjectId, &RawObject)> = HashMap::new();

        for object in objects {
            let oid = object.object_id();
            let offset = out.position();
            let mut entry = Vec::new();

            let delta = match (self.deltas, previous.get(&object.kind)) {
                (Some(base_kind), Some((base_offset, base_oid, base))) => {
                    let encoded = delta::encode_delta(&base.data, &object.data);
                    (encoded.len() < object.data.len() / 2).then(|| {
                        let header = match base_kind {
                            DeltaBase::Offset => {
                                let mut header = entry_header(OFS_DELTA, encoded.len() as u64);
                                header.extend(ofs_encoding(offset - *base_offset));
                                header
                            }
                            DeltaBase::ObjectId => {
                                let mut header = entry_header(REF_DELTA, encoded.len() as u64);
                                header.extend_from_slice(base_oid.as_bytes());
                                header
                            }
                        };
                        (header, encoded)
                    })
                }
                _ => None,
            };

            match delta {
                Some((header, encoded)) => {
                    entry.extend(header);
                    entry.extend(deflate(&encoded)?);
                }
                None => {
                    entry.extend(entry_header(object.kind.pack_code(), object.len() as u64));
                    entry.extend(deflate(&object.data)?);
                }
            }

            out.write(&entry)?;
            records.push(IndexRecord {
                oid,
                crc32: crc32fast::hash(&entry),
                offset,
            });
            previous.insert(object.kind, (offset, oid, object));
        }

        let (pack, checksum) = out.write_checksum()?;
        let index = write_index(records, &checksum)?;

        Ok(WrittenPack {
            pack,
            index,
            checksum: ObjectId::from_bytes(checksum),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::database::pack::Pack;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn blob(text: String) -> RawObject {
        RawObject::new(ObjectType::Blob, text.into_bytes())
    }

    fn open(written: &WrittenPack) -> (TempDir, Pack) {
        let dir = TempDir::new().unwrap();
        let pack_path = dir.path().join(format!("pack-{}.pack", written.checksum));
        std::fs::write(&pack_path, &written.pack).unwrap();
        std::fs::write(pack_path.with_extension("idx"), &written.index).unwrap();
        let pack = Pack::open(&pack_path).unwrap();
        (dir, pack)
    }

    #[test]
    fn encodes_offsets_like_git() {
        assert_eq!(ofs_encoding(127), vec![0x7f]);
        assert_eq!(ofs_encoding(128), vec![0x80, 0x00]);
        assert_eq!(entry_header(3, 15), vec![0x3f]);
        assert_eq!(entry_header(3, 16), vec![0xb0, 0x01]);
    }

    #[rstest]
    #[case(PackWriter::new())]
    #[case(PackWriter::with_deltas(DeltaBase::Offset))]
    #[case(PackWriter::with_deltas(DeltaBase::ObjectId))]
    fn written_packs_read_back_and_verify(#[case] writer: PackWriter) {
        let base = "line\n".repeat(200);
        let objects = vec![
            blob(base.clone()),
            blob(format!("{base}one more\n")),
            blob(format!("{base}two more\n")),
            RawObject::new(ObjectType::Tree, Vec::new()),
        ];

        let written = writer.write(&objects).unwrap();
        let (_dir, pack) = open(&written);
        pack.verify().unwrap();

        for object in &objects {
            let oid = object.object_id();
            assert_eq!(pack.read(&oid).unwrap().as_ref(), Some(object));
            assert_eq!(
                pack.read_header(&oid).unwrap(),
                Some((object.kind, object.len() as u64))
            );
        }
    }

    #[test]
    fn corrupted_entry_fails_verification() {
        let objects = vec![blob("x".repeat(64))];
        let mut written = PackWriter::new().write(&objects).unwrap();
        let last_data_byte = written.pack.len() - 21;
        written.pack[last_data_byte] ^= 0xff;

        let dir = TempDir::new().unwrap();
        let pack_path = dir.path().join("pack-x.pack");
        std::fs::write(&pack_path, &written.pack).unwrap();
        std::fs::write(pack_path.with_extension("idx"), &written.index).unwrap();

        let pack = Pack::open(&pack_path).unwrap();
        assert!(pack.verify().is_err());
    }
}
