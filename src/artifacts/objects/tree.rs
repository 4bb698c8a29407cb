//! Git tree object
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs),
//! symlinks, submodules (commits) and subdirectories (other trees), along with their
//! names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are sorted by name bytes, except that directory names compare as if a
//! trailing `/` were appended. A file `a.txt` therefore precedes a directory `a`.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::errors::{Error, Result};
use bytes::Bytes;
use derive_new::new;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Virtual terminator a name is compared with once its bytes run out
fn terminator(is_dir: bool) -> u8 {
    if is_dir { b'/' } else { 0 }
}

/// Canonical tree entry ordering
pub fn tree_name_cmp(a_name: &[u8], a_is_dir: bool, b_name: &[u8], b_is_dir: bool) -> Ordering {
    let common = a_name.len().min(b_name.len());
    match a_name[..common].cmp(&b_name[..common]) {
        Ordering::Equal => {}
        other => return other,
    }

    let a_next = a_name.get(common).copied().unwrap_or(terminator(a_is_dir));
    let b_next = b_name.get(common).copied().unwrap_or(terminator(b_is_dir));
    a_next
        .cmp(&b_next)
        .then_with(|| a_name.len().cmp(&b_name.len()))
}

/// Check that a byte string is usable as a single path component
pub fn validate_entry_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name == b"." || name == b".." || name.iter().any(|&b| b == b'/' || b == 0)
    {
        return Err(Error::invalid_spec(format!(
            "invalid tree entry name {:?}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(())
}

/// One `(mode, name, oid)` row of a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct TreeEntry {
    pub mode: EntryMode,
    #[new(into)]
    pub name: Vec<u8>,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn canonical_cmp(&self, other: &TreeEntry) -> Ordering {
        tree_name_cmp(&self.name, self.is_tree(), &other.name, other.is_tree())
    }
}

/// Git tree object representing a directory snapshot
///
/// Entries are always held in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// The empty tree, `4b825dc642cb6eb9a060e54bf8d69288fbee4904`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tree for writing: names are validated, modes normalized, entries sorted
    pub fn from_entries(entries: impl IntoIterator<Item = TreeEntry>) -> Result<Self> {
        let mut entries: Vec<TreeEntry> = entries
            .into_iter()
            .map(|mut entry| {
                validate_entry_name(&entry.name)?;
                entry.mode = entry.mode.normalized();
                Ok(entry)
            })
            .collect::<Result<_>>()?;

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.name.as_slice()) {
                return Err(Error::invalid_spec(format!(
                    "duplicate tree entry {:?}",
                    entry.name_lossy()
                )));
            }
        }

        entries.sort_by(TreeEntry::canonical_cmp);
        Ok(Tree { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TreeEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name
    pub fn get(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

impl Packable for Tree {
    fn serialize(&self) -> Result<Bytes> {
        let mut out = Vec::with_capacity(self.entries.len() * 48);
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            entry.oid.write_h40_to(&mut out)?;
        }
        Ok(Bytes::from(out))
    }
}

impl Unpackable for Tree {
    fn deserialize(payload: Bytes) -> Result<Self> {
        const WHAT: &str = "tree";
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut names = HashSet::new();
        let mut rest: &[u8] = &payload;

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::corrupt(WHAT, "entry without mode terminator"))?;
            let mode = EntryMode::parse_tree_mode(&rest[..space])?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::corrupt(WHAT, "entry without name terminator"))?;
            let name = &rest[..nul];
            validate_entry_name(name)
                .map_err(|_| Error::corrupt(WHAT, format!("invalid name {:?}", String::from_utf8_lossy(name))))?;
            rest = &rest[nul + 1..];

            if rest.len() < OBJECT_ID_RAW_LENGTH {
                return Err(Error::corrupt(WHAT, "truncated entry object id"));
            }
            let oid = ObjectId::try_from_slice(&rest[..OBJECT_ID_RAW_LENGTH])?;
            rest = &rest[OBJECT_ID_RAW_LENGTH..];

            let entry = TreeEntry::new(mode, name, oid);
            if let Some(previous) = entries.last()
                && previous.canonical_cmp(&entry) != Ordering::Less
            {
                return Err(Error::corrupt(
                    WHAT,
                    format!("entry {:?} out of order", entry.name_lossy()),
                ));
            }
            if !names.insert(entry.name.clone()) {
                return Err(Error::corrupt(
                    WHAT,
                    format!("duplicate entry {:?}", entry.name_lossy()),
                ));
            }
            entries.push(entry);
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
