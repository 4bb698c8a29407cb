//! Pack index (`.idx`) version 2
//!
//! ```text
//! \xfftOc | version=2 | fanout[256] u32 | oids[n] | crc32[n] u32
//!        | offsets[n] u32 | large_offsets[m] u64 | pack sha | idx sha
//! ```
//!
//! `fanout[b]` counts the objects whose first byte is `<= b`. An offset with
//! the high bit set is an index into the large-offset table.

use crate::artifacts::core::checksum::{self, Checksum, CHECKSUM_SIZE};
use crate::artifacts::objects::object_id::{ObjectId, ObjectIdPrefix};
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::errors::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;

pub const IDX_SIGNATURE: [u8; 4] = [0xff, b't', b'O', b'c'];
pub const IDX_VERSION: u32 = 2;
const HEADER_SIZE: usize = 8;
const FANOUT_SIZE: usize = 256 * 4;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

#[derive(Debug)]
pub struct PackIndex {
    data: Mmap,
    count: usize,
}

impl PackIndex {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        // SAFETY: pack indexes are written once and renamed into place, never modified
        let data = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
        let what = path.display().to_string();

        if data.len() < HEADER_SIZE + FANOUT_SIZE + 2 * CHECKSUM_SIZE {
            return Err(Error::corrupt(what, "pack index too short"));
        }
        if data[..4] != IDX_SIGNATURE {
            return Err(Error::corrupt(what, "bad pack index signature"));
        }
        if BigEndian::read_u32(&data[4..8]) != IDX_VERSION {
            return Err(Error::corrupt(what, "unsupported pack index version"));
        }

        let mut previous = 0;
        for bucket in 0..256 {
            let value = BigEndian::read_u32(&data[HEADER_SIZE + bucket * 4..]);
            if value < previous {
                return Err(Error::corrupt(what, "pack index fanout is not monotonic"));
            }
            previous = value;
        }
        let count = previous as usize;

        let min_len = HEADER_SIZE + FANOUT_SIZE + count * (OBJECT_ID_RAW_LENGTH + 8) + 2 * CHECKSUM_SIZE;
        if data.len() < min_len {
            return Err(Error::corrupt(what, "pack index truncated"));
        }

        Ok(PackIndex { data, count })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn fanout(&self, bucket: usize) -> usize {
        BigEndian::read_u32(&self.data[HEADER_SIZE + bucket * 4..]) as usize
    }

    fn oids_start(&self) -> usize {
        HEADER_SIZE + FANOUT_SIZE
    }

    fn crcs_start(&self) -> usize {
        self.oids_start() + self.count * OBJECT_ID_RAW_LENGTH
    }

    fn offsets_start(&self) -> usize {
        self.crcs_start() + self.count * 4
    }

    fn large_offsets_start(&self) -> usize {
        self.offsets_start() + self.count * 4
    }

    fn oid_bytes_at(&self, position: usize) -> &[u8] {
        let start = self.oids_start() + position * OBJECT_ID_RAW_LENGTH;
        &self.data[start..start + OBJECT_ID_RAW_LENGTH]
    }

    pub fn oid_at(&self, position: usize) -> Result<ObjectId> {
        ObjectId::try_from_slice(self.oid_bytes_at(position))
    }

    pub fn crc_at(&self, position: usize) -> u32 {
        BigEndian::read_u32(&self.data[self.crcs_start() + position * 4..])
    }

    pub fn offset_at(&self, position: usize) -> Result<u64> {
        let raw = BigEndian::read_u32(&self.data[self.offsets_start() + position * 4..]);
        if raw & LARGE_OFFSET_FLAG == 0 {
            return Ok(raw as u64);
        }

        let start = self.large_offsets_start() + (raw & !LARGE_OFFSET_FLAG) as usize * 8;
        self.data
            .get(start..start + 8)
            .filter(|_| start + 8 <= self.data.len() - 2 * CHECKSUM_SIZE)
            .map(BigEndian::read_u64)
            .ok_or_else(|| Error::corrupt("pack index", "large offset out of range"))
    }

    /// Position range of the objects whose first byte is `first`
    fn bucket(&self, first: u8) -> (usize, usize) {
        let end = self.fanout(first as usize);
        let start = match first {
            0 => 0,
            _ => self.fanout(first as usize - 1),
        };
        (start, end)
    }

    pub fn position_of(&self, oid: &ObjectId) -> Option<usize> {
        let (mut low, mut high) = self.bucket(oid.as_bytes()[0]);
        let needle = oid.as_bytes().as_slice();

        while low < high {
            let mid = low + (high - low) / 2;
            match self.oid_bytes_at(mid).cmp(needle) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Pack offset of an object, if this index lists it
    pub fn lookup(&self, oid: &ObjectId) -> Result<Option<u64>> {
        self.position_of(oid).map(|pos| self.offset_at(pos)).transpose()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.position_of(oid).is_some()
    }

    /// Objects whose name starts with `prefix`, at most `limit` of them
    pub fn matching(&self, prefix: &ObjectIdPrefix, limit: usize) -> Result<Vec<ObjectId>> {
        let (start, end) = match prefix.first_byte() {
            Some(first) => self.bucket(first),
            None => (0, self.count),
        };
        let min = prefix.min_oid();
        let first = start
            + (start..end)
                .position(|pos| self.oid_bytes_at(pos) >= min.as_bytes().as_slice())
                .unwrap_or(end - start);

        let mut found = Vec::new();
        for pos in first..end {
            let oid = self.oid_at(pos)?;
            if !prefix.matches(&oid) {
                break;
            }
            found.push(oid);
            if found.len() >= limit {
                break;
            }
        }
        Ok(found)
    }

    pub fn oids(&self) -> impl Iterator<Item = Result<ObjectId>> + '_ {
        (0..self.count).map(|pos| self.oid_at(pos))
    }

    /// Checksum of the pack this index describes
    pub fn pack_checksum(&self) -> &[u8] {
        let end = self.data.len() - CHECKSUM_SIZE;
        &self.data[end - CHECKSUM_SIZE..end]
    }

    pub fn verify(&self) -> Result<()> {
        checksum::verify(&self.data, "pack index").map(|_| ())
    }
}

/// One object of a pack as the index records it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub oid: ObjectId,
    pub crc32: u32,
    pub offset: u64,
}

/// Serialize a version 2 pack index for `records`
pub fn write_index(mut records: Vec<IndexRecord>, pack_checksum: &[u8]) -> Result<Vec<u8>> {
    records.sort_by(|a, b| a.oid.cmp(&b.oid));

    let mut out = Checksum::new(Vec::new());
    out.write(&IDX_SIGNATURE)?;
    out.write(&IDX_VERSION.to_be_bytes())?;

    let mut fanout = [0u32; 256];
    for record in &records {
        fanout[record.oid.as_bytes()[0] as usize] += 1;
    }
    let mut running = 0;
    for count in fanout {
        running += count;
        out.write(&running.to_be_bytes())?;
    }

    for record in &records {
        out.write(record.oid.as_bytes())?;
    }
    for record in &records {
        out.write(&record.crc32.to_be_bytes())?;
    }

    let mut large = Vec::new();
    for record in &records {
        if record.offset >= LARGE_OFFSET_FLAG as u64 {
            let slot = LARGE_OFFSET_FLAG | large.len() as u32;
            large.push(record.offset);
            out.write(&slot.to_be_bytes())?;
        } else {
            out.write(&(record.offset as u32).to_be_bytes())?;
        }
    }
    for offset in large {
        out.write(&offset.to_be_bytes())?;
    }

    out.write(pack_checksum)?;
    let (data, _) = out.write_checksum()?;
    Ok(data)
}
