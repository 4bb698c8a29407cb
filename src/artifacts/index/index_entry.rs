//! Index entry representation
//!
//! Each entry in the index represents a staged path with:
//! - File path (bytes, slash separated)
//! - Content hash (object ID)
//! - Merge stage (0 for a clean entry, 1..=3 for conflict sides)
//! - File metadata (mode, size, timestamps)
//!
//! ## Entry Format
//!
//! ```text
//! ctime ctime_nsec mtime mtime_nsec dev ino mode uid gid size   10 x u32
//! oid                                                            20 bytes
//! flags                                                          u16
//! extended flags (version 3+, only when the extended bit is set) u16
//! path
//! ```
//!
//! Versions 2 and 3 terminate the path with one to eight NULs so the entry
//! length is a multiple of eight. Version 4 prefixes the path with a varint
//! counting the bytes to drop from the end of the previous path, terminates
//! it with a single NUL and does not pad.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use std::ffi::OsStr;
use std::fs::Metadata;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Fixed part of an entry: ten stat words, the object id and the flags
pub const ENTRY_FIXED_SIZE: usize = 62;

const FLAG_ASSUME_VALID: u16 = 0x8000;
const FLAG_EXTENDED: u16 = 0x4000;
const FLAG_STAGE_MASK: u16 = 0x3000;
const FLAG_STAGE_SHIFT: u16 = 12;
const FLAG_NAME_MASK: u16 = 0x0fff;

const EXT_SKIP_WORKTREE: u16 = 0x4000;
const EXT_INTENT_TO_ADD: u16 = 0x2000;

bitflags! {
    /// Per-entry flags beyond the stage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u8 {
        const ASSUME_VALID = 1 << 0;
        const SKIP_WORKTREE = 1 << 1;
        const INTENT_TO_ADD = 1 << 2;
    }
}

impl EntryFlags {
    /// Flags that only exist in the version 3 extended word
    pub fn needs_extended(&self) -> bool {
        self.intersects(EntryFlags::SKIP_WORKTREE | EntryFlags::INTENT_TO_ADD)
    }
}

/// Check that `path` is storable in the index
pub fn validate_path(path: &[u8]) -> Result<()> {
    let invalid = |reason: &str| {
        Error::invalid_spec(format!(
            "invalid index path {:?}: {reason}",
            String::from_utf8_lossy(path)
        ))
    };

    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.contains(&0) {
        return Err(invalid("contains NUL"));
    }
    for component in path.split(|&b| b == b'/') {
        match component {
            b"" => return Err(invalid("empty component")),
            b"." | b".." => return Err(invalid("relative component")),
            c if c.eq_ignore_ascii_case(b".git") => return Err(invalid("reserved component")),
            _ => {}
        }
    }
    Ok(())
}

/// Trees are never stored in the index
pub fn validate_mode(entry: &IndexEntry) -> Result<()> {
    if entry.mode().is_tree() {
        return Err(Error::invalid_spec(format!(
            "{} cannot be staged with a directory mode",
            String::from_utf8_lossy(&entry.path)
        )));
    }
    Ok(())
}

/// File metadata stored in index entries
///
/// Values are kept at the 32-bit width the file format stores, so an entry
/// read from disk writes back unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: u32,
    pub ctime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    /// File size, truncated to 32 bits
    pub size: u32,
}

impl EntryMetadata {
    /// Metadata for content that has no stat information yet
    pub fn with_mode(mode: EntryMode) -> Self {
        EntryMetadata {
            mode,
            ..Default::default()
        }
    }

    pub fn from_fs(path: &Path, metadata: &Metadata) -> Self {
        EntryMetadata {
            ctime: metadata.ctime() as u32,
            ctime_nsec: metadata.ctime_nsec() as u32,
            mtime: metadata.mtime() as u32,
            mtime_nsec: metadata.mtime_nsec() as u32,
            dev: metadata.dev() as u32,
            ino: metadata.ino() as u32,
            mode: EntryMode::from_metadata(path, metadata),
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size() as u32,
        }
    }
}

/// Index entry representing a staged path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root
    pub path: Vec<u8>,
    /// Hash of the staged content
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
    /// 0 when merged, otherwise 1 (base), 2 (ours) or 3 (theirs)
    pub stage: u8,
    pub flags: EntryFlags,
}

impl IndexEntry {
    pub fn new(path: impl Into<Vec<u8>>, oid: ObjectId, metadata: EntryMetadata) -> Self {
        IndexEntry {
            path: path.into(),
            oid,
            metadata,
            stage: 0,
            flags: EntryFlags::empty(),
        }
    }

    /// Entry for a blob known only from a tree: stat fields are zero
    pub fn from_tree_entry(path: impl Into<Vec<u8>>, mode: EntryMode, oid: ObjectId) -> Self {
        Self::new(path, oid, EntryMetadata::with_mode(mode))
    }

    pub fn with_stage(mut self, stage: u8) -> Result<Self> {
        if stage > 3 {
            return Err(Error::invalid_spec(format!("invalid index stage {stage}")));
        }
        self.stage = stage;
        Ok(self)
    }

    pub fn key(&self) -> (Vec<u8>, u8) {
        (self.path.clone(), self.stage)
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    pub fn path_lossy(&self) -> String {
        String::from_utf8_lossy(&self.path).into_owned()
    }

    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(OsStr::from_bytes(&self.path))
    }

    pub fn basename(&self) -> &[u8] {
        match self.path.iter().rposition(|&b| b == b'/') {
            Some(slash) => &self.path[slash + 1..],
            None => &self.path,
        }
    }

    /// Every leading directory of the path, outermost first
    pub fn parent_dirs(&self) -> Vec<&[u8]> {
        parent_dirs(&self.path)
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode.normalized() == other.mode.normalized()
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    /// Append the on-disk form of this entry
    pub fn encode(&self, version: u32, previous_path: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        let m = &self.metadata;
        for word in [
            m.ctime,
            m.ctime_nsec,
            m.mtime,
            m.mtime_nsec,
            m.dev,
            m.ino,
            m.mode.as_u32(),
            m.uid,
            m.gid,
            m.size,
        ] {
            out.write_u32::<NetworkEndian>(word)?;
        }
        self.oid.write_h40_to(out)?;

        let extended = self.flags.needs_extended();
        if extended && version < 3 {
            return Err(Error::invalid_spec(
                "extended entry flags need index version 3 or later",
            ));
        }

        let mut flags = (self.path.len().min(FLAG_NAME_MASK as usize)) as u16;
        flags |= (self.stage as u16) << FLAG_STAGE_SHIFT;
        if self.flags.contains(EntryFlags::ASSUME_VALID) {
            flags |= FLAG_ASSUME_VALID;
        }
        if extended {
            flags |= FLAG_EXTENDED;
        }
        out.write_u16::<NetworkEndian>(flags)?;

        if extended {
            let mut extended_flags = 0;
            if self.flags.contains(EntryFlags::SKIP_WORKTREE) {
                extended_flags |= EXT_SKIP_WORKTREE;
            }
            if self.flags.contains(EntryFlags::INTENT_TO_ADD) {
                extended_flags |= EXT_INTENT_TO_ADD;
            }
            out.write_u16::<NetworkEndian>(extended_flags)?;
        }

        if version >= 4 {
            let common = previous_path
                .iter()
                .zip(&self.path)
                .take_while(|(a, b)| a == b)
                .count();
            write_varint(out, (previous_path.len() - common) as u64);
            out.extend_from_slice(&self.path[common..]);
            out.push(0);
        } else {
            out.extend_from_slice(&self.path);
            let entry_len = (out.len() - start + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1);
            out.resize(start + entry_len, 0);
        }

        Ok(())
    }

    /// Parse one entry starting at `*pos`, advancing past it
    pub fn decode(data: &[u8], pos: &mut usize, version: u32, previous_path: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| Error::corrupt("index", format!("entry at {}: {reason}", *pos));
        let start = *pos;
        let fixed = data
            .get(start..start + ENTRY_FIXED_SIZE)
            .ok_or_else(|| corrupt("truncated"))?;

        let word = |i: usize| NetworkEndian::read_u32(&fixed[i * 4..i * 4 + 4]);
        let mode = EntryMode::try_from(word(6))
            .ok()
            .filter(|mode| !mode.is_tree())
            .ok_or_else(|| corrupt("invalid mode"))?;
        let metadata = EntryMetadata {
            ctime: word(0),
            ctime_nsec: word(1),
            mtime: word(2),
            mtime_nsec: word(3),
            dev: word(4),
            ino: word(5),
            mode,
            uid: word(7),
            gid: word(8),
            size: word(9),
        };
        let oid = ObjectId::try_from_slice(&fixed[40..40 + OBJECT_ID_RAW_LENGTH])?;
        let raw_flags = NetworkEndian::read_u16(&fixed[60..62]);

        let mut cursor = start + ENTRY_FIXED_SIZE;
        let mut flags = EntryFlags::empty();
        if raw_flags & FLAG_ASSUME_VALID != 0 {
            flags |= EntryFlags::ASSUME_VALID;
        }
        if raw_flags & FLAG_EXTENDED != 0 {
            if version < 3 {
                return Err(corrupt("extended flags in a version 2 index"));
            }
            let extended = data
                .get(cursor..cursor + 2)
                .map(NetworkEndian::read_u16)
                .ok_or_else(|| corrupt("truncated extended flags"))?;
            if extended & !(EXT_SKIP_WORKTREE | EXT_INTENT_TO_ADD) != 0 {
                return Err(corrupt("unknown extended flags"));
            }
            if extended & EXT_SKIP_WORKTREE != 0 {
                flags |= EntryFlags::SKIP_WORKTREE;
            }
            if extended & EXT_INTENT_TO_ADD != 0 {
                flags |= EntryFlags::INTENT_TO_ADD;
            }
            cursor += 2;
        }
        let stage = ((raw_flags & FLAG_STAGE_MASK) >> FLAG_STAGE_SHIFT) as u8;

        let path = if version >= 4 {
            let strip = read_varint(data, &mut cursor).ok_or_else(|| corrupt("truncated path prefix"))? as usize;
            if strip > previous_path.len() {
                return Err(corrupt("path prefix longer than previous path"));
            }
            let nul = data[cursor..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| corrupt("unterminated path"))?;
            let mut path = previous_path[..previous_path.len() - strip].to_vec();
            path.extend_from_slice(&data[cursor..cursor + nul]);
            cursor += nul + 1;
            path
        } else {
            let name_len = (raw_flags & FLAG_NAME_MASK) as usize;
            let nul = if name_len < FLAG_NAME_MASK as usize {
                (data.get(cursor + name_len) == Some(&0)).then_some(name_len)
            } else {
                data[cursor..].iter().position(|&b| b == 0)
            }
            .ok_or_else(|| corrupt("unterminated path"))?;
            let path = data[cursor..cursor + nul].to_vec();

            let entry_len = (cursor - start + nul + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1);
            cursor = start + entry_len;
            if cursor > data.len() {
                return Err(corrupt("truncated padding"));
            }
            path
        };

        validate_path(&path).map_err(|e| Error::corrupt("index", e.to_string()))?;
        *pos = cursor;

        Ok(IndexEntry {
            path,
            oid,
            metadata,
            stage,
            flags,
        })
    }
}

pub fn parent_dirs(path: &[u8]) -> Vec<&[u8]> {
    path.iter()
        .enumerate()
        .filter(|(_, b)| **b == b'/')
        .map(|(i, _)| &path[..i])
        .collect()
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    let mut encoded = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value != 0 {
        value -= 1;
        encoded.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    encoded.reverse();
    out.extend(encoded);
}

fn read_varint(data: &[u8], pos: &mut usize) -> Option<u64> {
    let mut c = *data.get(*pos)?;
    *pos += 1;
    let mut value = (c & 0x7f) as u64;
    while c & 0x80 != 0 {
        c = *data.get(*pos)?;
        *pos += 1;
        value = (value.checked_add(1)?).checked_mul(128)? + (c & 0x7f) as u64;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap()
    }

    fn entry(path: &str, oid: ObjectId) -> IndexEntry {
        IndexEntry::new(path, oid, EntryMetadata::with_mode(EntryMode::REGULAR))
    }

    #[rstest]
    fn test_entry_parent_dirs(oid: ObjectId) {
        let entry = entry("a/b/c", oid);
        assert_eq!(entry.parent_dirs(), vec![&b"a"[..], &b"a/b"[..]]);
        assert_eq!(entry.basename(), b"c");
    }

    #[rstest]
    fn test_entry_parent_dirs_root(oid: ObjectId) {
        assert_eq!(entry("a", oid).parent_dirs(), Vec::<&[u8]>::new());
    }

    #[rstest]
    #[case("a", 72)]
    #[case("abcdefgh", 72)]
    #[case("abcdefghijklmnopq", 80)]
    fn version_two_entries_are_padded_to_eight_bytes(
        oid: ObjectId,
        #[case] path: &str,
        #[case] expected_len: usize,
    ) {
        let mut out = Vec::new();
        entry(path, oid).encode(2, b"", &mut out).unwrap();
        assert_eq!(out.len(), expected_len);
        assert_eq!(out.last(), Some(&0));

        let mut pos = 0;
        let decoded = IndexEntry::decode(&out, &mut pos, 2, b"").unwrap();
        assert_eq!(pos, out.len());
        assert_eq!(decoded, entry(path, oid));
    }

    #[rstest]
    fn version_four_paths_share_prefix_with_previous(oid: ObjectId) {
        let mut out = Vec::new();
        let first = entry("src/lib.rs", oid);
        let second = entry("src/main.rs", oid);
        first.encode(4, b"", &mut out).unwrap();
        let split = out.len();
        second.encode(4, &first.path, &mut out).unwrap();

        // strip "lib.rs" (6 bytes) and append "main.rs"
        assert_eq!(&out[split + ENTRY_FIXED_SIZE..], b"\x06main.rs\0");

        let mut pos = 0;
        let a = IndexEntry::decode(&out, &mut pos, 4, b"").unwrap();
        let b = IndexEntry::decode(&out, &mut pos, 4, &a.path).unwrap();
        assert_eq!((a, b), (first, second));
    }

    #[rstest]
    fn extended_flags_round_trip_in_version_three(oid: ObjectId) {
        let mut staged = entry("sparse/file", oid).with_stage(2).unwrap();
        staged.flags = EntryFlags::SKIP_WORKTREE | EntryFlags::ASSUME_VALID;

        let mut out = Vec::new();
        assert!(staged.encode(2, b"", &mut out).is_err());

        out.clear();
        staged.encode(3, b"", &mut out).unwrap();
        let mut pos = 0;
        assert_eq!(IndexEntry::decode(&out, &mut pos, 3, b"").unwrap(), staged);
    }

    #[rstest]
    #[case("")]
    #[case("/abs")]
    #[case("a//b")]
    #[case("a/./b")]
    #[case("../x")]
    #[case(".git/config")]
    #[case("sub/.GIT")]
    #[case("trailing/")]
    fn rejects_unsafe_paths(#[case] path: &str) {
        assert!(validate_path(path.as_bytes()).is_err());
    }

    #[test]
    fn varint_uses_offset_encoding() {
        for value in [0u64, 1, 127, 128, 300, 16511, 16512, 1 << 40] {
            let mut out = Vec::new();
            write_varint(&mut out, value);
            let mut pos = 0;
            assert_eq!(read_varint(&out, &mut pos), Some(value));
            assert_eq!(pos, out.len());
        }
    }
}
