//! Packfile reader
//!
//! ```text
//! PACK | version=2 | count | entries... | sha1 of everything before
//! ```
//!
//! Each entry starts with a varint header carrying the type in bits 4..6 of the
//! first byte and the inflated size in the remaining bits. Delta entries are
//! followed by their base: a negative offset (`OFS_DELTA`) or a raw object id
//! (`REF_DELTA`). The payload is zlib-compressed.

use crate::artifacts::core::checksum::{self, CHECKSUM_SIZE};
use crate::artifacts::database::delta;
use crate::artifacts::database::pack_index::PackIndex;
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::{ObjectId, ObjectIdPrefix};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::errors::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;
pub const OFS_DELTA: u8 = 6;
pub const REF_DELTA: u8 = 7;

/// Longest delta chain followed before the pack is declared corrupt
const MAX_CHAIN_LENGTH: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Base(ObjectType),
    OfsDelta { base_offset: u64 },
    RefDelta { base_oid: ObjectId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: EntryKind,
    /// Inflated size of the entry payload (the delta itself for delta entries)
    pub size: u64,
    /// Offset of the compressed payload
    pub data_start: usize,
}

#[derive(Debug)]
pub struct Pack {
    path: PathBuf,
    data: Mmap,
    index: PackIndex,
}

impl Pack {
    /// Open `pack-*.pack` together with its sibling `.idx`
    pub fn open(pack_path: &Path) -> Result<Self> {
        let index = PackIndex::open(&pack_path.with_extension("idx"))?;

        let file = File::open(pack_path).map_err(|e| Error::io(pack_path, e))?;
        // SAFETY: packs are written once and renamed into place, never modified
        let data = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(pack_path, e))?;
        let what = pack_path.display().to_string();

        if data.len() < PACK_HEADER_SIZE + CHECKSUM_SIZE || &data[..4] != PACK_SIGNATURE {
            return Err(Error::corrupt(what, "bad pack signature"));
        }
        let version = BigEndian::read_u32(&data[4..8]);
        if version != 2 && version != 3 {
            return Err(Error::corrupt(what, format!("unsupported pack version {version}")));
        }
        let count = BigEndian::read_u32(&data[8..12]) as usize;
        if count != index.len() {
            return Err(Error::corrupt(what, "pack and index disagree on object count"));
        }
        if &data[data.len() - CHECKSUM_SIZE..] != index.pack_checksum() {
            return Err(Error::corrupt(what, "pack checksum does not match its index"));
        }

        Ok(Pack {
            path: pack_path.to_path_buf(),
            data,
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.contains(oid)
    }

    pub fn matching(&self, prefix: &ObjectIdPrefix, limit: usize) -> Result<Vec<ObjectId>> {
        self.index.matching(prefix, limit)
    }

    fn data_end(&self) -> usize {
        self.data.len() - CHECKSUM_SIZE
    }

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::corrupt(self.path.display().to_string(), reason)
    }

    fn byte_at(&self, pos: usize) -> Result<u8> {
        if pos >= self.data_end() {
            return Err(self.corrupt("entry header truncated"));
        }
        Ok(self.data[pos])
    }

    pub fn entry_header_at(&self, offset: u64) -> Result<EntryHeader> {
        let start = offset as usize;
        if start < PACK_HEADER_SIZE || start >= self.data_end() {
            return Err(self.corrupt(format!("entry offset {offset} out of range")));
        }

        let mut pos = start;
        let mut byte = self.byte_at(pos)?;
        pos += 1;
        let type_code = (byte >> 4) & 0x07;
        let mut size = (byte & 0x0f) as u64;
        let mut shift = 4;
        while byte & 0x80 != 0 {
            byte = self.byte_at(pos)?;
            pos += 1;
            if shift > 57 {
                return Err(self.corrupt("entry size header too long"));
            }
            size |= ((byte & 0x7f) as u64) << shift;
            shift += 7;
        }

        let kind = match type_code {
            OFS_DELTA => {
                let mut c = self.byte_at(pos)?;
                pos += 1;
                let mut back = (c & 0x7f) as u64;
                while c & 0x80 != 0 {
                    c = self.byte_at(pos)?;
                    pos += 1;
                    back = back
                        .checked_add(1)
                        .and_then(|v| v.checked_mul(128))
                        .ok_or_else(|| self.corrupt("delta base offset overflow"))?
                        | (c & 0x7f) as u64;
                }
                if back == 0 || back > offset {
                    return Err(self.corrupt("delta base offset out of range"));
                }
                EntryKind::OfsDelta {
                    base_offset: offset - back,
                }
            }
            REF_DELTA => {
                let end = pos + OBJECT_ID_RAW_LENGTH;
                if end > self.data_end() {
                    return Err(self.corrupt("delta base id truncated"));
                }
                let base_oid = ObjectId::try_from_slice(&self.data[pos..end])?;
                pos = end;
                EntryKind::RefDelta { base_oid }
            }
            code => EntryKind::Base(
                ObjectType::from_pack_code(code)
                    .ok_or_else(|| self.corrupt(format!("invalid entry type {code}")))?,
            ),
        };

        Ok(EntryHeader {
            kind,
            size,
            data_start: pos,
        })
    }

    fn inflate(&self, header: &EntryHeader) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(header.size as usize);
        ZlibDecoder::new(&self.data[header.data_start..self.data_end()])
            .take(header.size + 1)
            .read_to_end(&mut out)
            .map_err(|e| self.corrupt(format!("inflate failed: {e}")))?;
        if out.len() as u64 != header.size {
            return Err(self.corrupt("inflated size does not match entry header"));
        }
        Ok(out)
    }

    /// Inflate at most `limit` bytes of an entry payload
    fn inflate_prefix(&self, header: &EntryHeader, limit: u64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ZlibDecoder::new(&self.data[header.data_start..self.data_end()])
            .take(limit)
            .read_to_end(&mut out)
            .map_err(|e| self.corrupt(format!("inflate failed: {e}")))?;
        Ok(out)
    }

    fn base_offset(&self, kind: &EntryKind) -> Result<u64> {
        match kind {
            EntryKind::OfsDelta { base_offset } => Ok(*base_offset),
            EntryKind::RefDelta { base_oid } => self.index.lookup(base_oid)?.ok_or_else(|| {
                self.corrupt(format!("delta base {base_oid} is not in this pack"))
            }),
            EntryKind::Base(_) => Err(self.corrupt("base entry has no delta base")),
        }
    }

    /// Reconstruct the object stored at `offset`
    pub fn read_at(&self, offset: u64) -> Result<RawObject> {
        let mut deltas = Vec::new();
        let mut header = self.entry_header_at(offset)?;

        let kind = loop {
            match header.kind {
                EntryKind::Base(kind) => break kind,
                delta_kind => {
                    if deltas.len() >= MAX_CHAIN_LENGTH {
                        return Err(self.corrupt("delta chain too long"));
                    }
                    deltas.push(self.inflate(&header)?);
                    header = self.entry_header_at(self.base_offset(&delta_kind)?)?;
                }
            }
        };

        let mut data = self.inflate(&header)?;
        for delta in deltas.iter().rev() {
            data = delta::apply_delta(&data, delta)?;
        }

        Ok(RawObject::new(kind, data))
    }

    pub fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>> {
        match self.index.lookup(oid)? {
            Some(offset) => {
                let raw = self.read_at(offset)?;
                if raw.object_id() != *oid {
                    return Err(self.corrupt(format!("object {oid} does not match its digest")));
                }
                Ok(Some(raw))
            }
            None => Ok(None),
        }
    }

    /// Kind and size of an object without reconstructing its payload
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, u64)>> {
        let Some(offset) = self.index.lookup(oid)? else {
            return Ok(None);
        };

        let first = self.entry_header_at(offset)?;
        let size = match first.kind {
            EntryKind::Base(kind) => return Ok(Some((kind, first.size))),
            // Two varints of at most ten bytes each
            _ => delta::delta_sizes(&self.inflate_prefix(&first, 20)?)?.1,
        };

        let mut header = first;
        let mut hops = 0;
        let kind = loop {
            match header.kind {
                EntryKind::Base(kind) => break kind,
                delta_kind => {
                    hops += 1;
                    if hops > MAX_CHAIN_LENGTH {
                        return Err(self.corrupt("delta chain too long"));
                    }
                    header = self.entry_header_at(self.base_offset(&delta_kind)?)?;
                }
            }
        };

        Ok(Some((kind, size)))
    }

    /// Check trailers, per-entry CRC32 and every object digest
    pub fn verify(&self) -> Result<()> {
        checksum::verify(&self.data, &self.path.display().to_string())?;
        self.index.verify()?;

        let mut entries = (0..self.index.len())
            .map(|pos| Ok((self.index.offset_at(pos)?, pos)))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_unstable();

        for (i, &(offset, pos)) in entries.iter().enumerate() {
            let end = entries
                .get(i + 1)
                .map(|(next, _)| *next as usize)
                .unwrap_or(self.data_end());
            let start = offset as usize;
            if start >= end || end > self.data_end() {
                return Err(self.corrupt(format!("entry at offset {offset} out of range")));
            }

            let oid = self.index.oid_at(pos)?;
            if crc32fast::hash(&self.data[start..end]) != self.index.crc_at(pos) {
                return Err(self.corrupt(format!("crc mismatch for object {oid}")));
            }
            if self.read_at(offset)?.object_id() != oid {
                return Err(self.corrupt(format!("object {oid} does not match its digest")));
            }
        }

        Ok(())
    }
}
