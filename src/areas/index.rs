//! Git index (staging area)
//!
//! The index is Git's staging area that tracks which files should be included in the next commit.
//! It maintains metadata about files including their mode, timestamps, and SHA-1 hashes.
//!
//! ## Index File Format
//!
//! The index file contains:
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked paths with metadata, keyed by (path, stage)
//! - Extensions: Optional named sections, kept verbatim when not understood
//! - Checksum: SHA-1 hash of the entire index for integrity verification
//!
//! ## Data Structures
//!
//! - `entries`: Maps (path, stage) to index entries, in on-disk order
//! - `children`: Maps directory paths to the tracked paths below them

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::checksum::{self, Checksum};
use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::index::extension::Extension;
use crate::artifacts::index::index_entry::{
    EntryMetadata, IndexEntry, parent_dirs, validate_mode, validate_path,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{DEFAULT_VERSION, HEADER_SIZE, MAX_VERSION, MIN_VERSION, materializer};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

type EntryKey = (Vec<u8>, u8);

/// The conflicting sides recorded for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub path: Vec<u8>,
    pub ancestor: Option<IndexEntry>,
    pub ours: Option<IndexEntry>,
    pub theirs: Option<IndexEntry>,
}

/// Git index (staging area)
///
/// Tracks paths staged for the next commit along with their metadata.
/// The index is persisted to disk and uses checksums for integrity verification.
#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: PathBuf,
    /// Staged entries mapped by (path, stage)
    entries: BTreeMap<EntryKey, IndexEntry>,
    /// Directory hierarchy for efficient parent-child lookups
    children: BTreeMap<Vec<u8>, BTreeSet<Vec<u8>>>,
    version: u32,
    extensions: Vec<Extension>,
    /// Flag indicating if the index has been modified since loading
    changed: bool,
}

impl Index {
    /// Create a new empty index that will be written to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Index {
            path: path.into(),
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            version: DEFAULT_VERSION,
            extensions: Vec::new(),
            changed: false,
        }
    }

    /// Load the index stored at `path`; a missing file is an empty index
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut index = Self::new(path);
        index.read()?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) -> Result<()> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::invalid_spec(format!(
                "unsupported index version {version}"
            )));
        }
        self.version = version;
        self.changed = true;
        Ok(())
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Whether there are mutations not yet written to disk
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.extensions.clear();
        self.version = DEFAULT_VERSION;
        self.changed = false;
    }

    /// Reload the index from disk, discarding unwritten mutations
    ///
    /// # Locking
    ///
    /// Acquires a shared lock on the index file during reading.
    pub fn read(&mut self) -> Result<()> {
        self.reset();

        let mut index_file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)
            .map_err(|e| Error::io(&self.path, e))?;

        let mut data = Vec::new();
        lock.deref_mut()
            .read_to_end(&mut data)
            .map_err(|e| Error::io(&self.path, e))?;

        // if the index file is empty, treat it as an empty index
        if data.is_empty() {
            return Ok(());
        }

        self.parse(&data)
    }

    fn parse(&mut self, data: &[u8]) -> Result<()> {
        let body = checksum::verify(data, "index")?;
        let header = IndexHeader::deserialize(body)?;
        self.version = header.version;

        let mut pos = HEADER_SIZE;
        let mut previous: Option<IndexEntry> = None;

        for _ in 0..header.entries_count {
            let previous_path = previous.as_ref().map(|e| e.path.as_slice()).unwrap_or(b"");
            let entry = IndexEntry::decode(body, &mut pos, header.version, previous_path)?;

            if let Some(previous) = &previous {
                if previous.key() >= entry.key() {
                    return Err(Error::corrupt(
                        "index",
                        format!("entries out of order at {}", entry.path_lossy()),
                    ));
                }
                if previous.path == entry.path && (previous.stage == 0 || entry.stage == 0) {
                    return Err(Error::corrupt(
                        "index",
                        format!("merged and unmerged entries for {}", entry.path_lossy()),
                    ));
                }
            }

            self.store_entry(entry.clone());
            previous = Some(entry);
        }

        self.extensions = Extension::decode_all(&body[pos..])?;
        Ok(())
    }

    /// Atomically rewrite the index file
    pub fn write(&mut self) -> Result<()> {
        let mut lock = Lockfile::acquire(&self.path)?;

        if self.version < 3 && self.entries.values().any(|e| e.flags.needs_extended()) {
            self.version = 3;
        }

        let mut writer = Checksum::new(Vec::new());
        writer.write(&IndexHeader::new(self.version, self.entries.len() as u32).serialize()?)?;

        let mut previous_path: &[u8] = b"";
        let mut buffer = Vec::new();
        for entry in self.entries.values() {
            buffer.clear();
            entry.encode(self.version, previous_path, &mut buffer)?;
            writer.write(&buffer)?;
            previous_path = &entry.path;
        }

        for extension in &self.extensions {
            buffer.clear();
            extension.encode(&mut buffer)?;
            writer.write(&buffer)?;
        }

        let (content, _) = writer.write_checksum()?;
        lock.write_all(&content)
            .map_err(|e| Error::io(lock.lock_path(), e))?;
        lock.commit()?;

        tracing::debug!(
            "wrote index {:?} (version {}, {} entries)",
            self.path,
            self.version,
            self.entries.len()
        );
        self.changed = false;
        Ok(())
    }

    fn mark_changed(&mut self) {
        self.extensions.retain(|ext| !ext.invalidated_by_mutation());
        self.changed = true;
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in parent_dirs(&entry.path) {
            self.children
                .entry(parent.to_vec())
                .or_default()
                .insert(entry.path.clone());
        }
        self.entries.insert(entry.key(), entry);
    }

    fn stages_of(&self, path: &[u8]) -> Vec<u8> {
        (0..=3u8)
            .filter(|stage| self.entries.contains_key(&(path.to_vec(), *stage)))
            .collect()
    }

    fn remove_entry(&mut self, path: &[u8], stage: u8) -> Option<IndexEntry> {
        let removed = self.entries.remove(&(path.to_vec(), stage))?;

        if self.stages_of(path).is_empty() {
            for parent in parent_dirs(path) {
                if let Some(children) = self.children.get_mut(parent) {
                    children.remove(path);
                    if children.is_empty() {
                        self.children.remove(parent);
                    }
                }
            }
        }

        Some(removed)
    }

    fn remove_all_stages(&mut self, path: &[u8]) -> usize {
        (0..=3u8)
            .filter_map(|stage| self.remove_entry(path, stage))
            .count()
    }

    fn remove_children(&mut self, path: &[u8]) -> usize {
        match self.children.get(path).cloned() {
            Some(children) => children
                .iter()
                .map(|child| self.remove_all_stages(child))
                .sum(),
            None => 0,
        }
    }

    /// Remove any conflicting entries before adding a new entry
    ///
    /// Removes parent directories that might be file entries, and
    /// removes any children entries if this entry is becoming a file.
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in parent_dirs(&entry.path) {
            let parent = parent.to_vec();
            self.remove_all_stages(&parent);
        }
        self.remove_children(&entry.path);
    }

    /// Insert or replace the entry for `(entry.path, entry.stage)`
    ///
    /// A stage 0 entry resolves any conflict recorded for the path, and an
    /// unmerged entry replaces the stage 0 one.
    pub fn add(&mut self, entry: IndexEntry) -> Result<()> {
        validate_path(&entry.path)?;
        validate_mode(&entry)?;
        if entry.stage > 3 {
            return Err(Error::invalid_spec(format!("invalid stage {}", entry.stage)));
        }

        self.discard_conflicts(&entry);
        if entry.stage == 0 {
            self.remove_all_stages(&entry.path);
        } else {
            self.remove_entry(&entry.path, 0);
        }
        self.store_entry(entry);
        self.mark_changed();

        Ok(())
    }

    /// Hash the working tree file at `path` into the database and stage it
    pub fn add_by_path(
        &mut self,
        workspace: &Workspace,
        database: &Database,
        path: &[u8],
    ) -> Result<ObjectId> {
        validate_path(path)?;
        let stat = workspace.stat_file(path)?.ok_or_else(|| {
            Error::not_found(format!(
                "{} in working tree",
                String::from_utf8_lossy(path)
            ))
        })?;
        let data = workspace.read_file(path)?;
        let oid = database.write(ObjectType::Blob, &data)?;

        self.add(IndexEntry::new(path, oid, stat))?;
        Ok(oid)
    }

    /// Unstage `path`, or every path below it when it names a directory
    pub fn remove(&mut self, path: &[u8]) -> Result<()> {
        let removed = self.remove_all_stages(path) + self.remove_children(path);
        if removed == 0 {
            return Err(Error::not_found(format!(
                "{} in index",
                String::from_utf8_lossy(path)
            )));
        }
        self.mark_changed();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.mark_changed();
    }

    pub fn get(&self, path: &[u8], stage: u8) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_vec(), stage))
    }

    pub fn get_by_position(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.values().nth(position)
    }

    /// Position of the first entry for `path`
    pub fn find(&self, path: &[u8]) -> Result<usize> {
        let first = (path.to_vec(), 0u8);
        match self.entries.range(&first..).next() {
            Some((key, _)) if key.0 == path => Ok(self.entries.range(..&first).count()),
            _ => Err(Error::not_found(format!(
                "{} in index",
                String::from_utf8_lossy(path)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> impl Iterator<Item = IndexEntry> {
        self.entries.into_values()
    }

    /// Check if a path is tracked directly in the index
    ///
    /// Returns true if the path is either a file entry or has children
    /// (is a directory with tracked files).
    pub fn is_directly_tracked(&self, path: &[u8]) -> bool {
        !self.stages_of(path).is_empty() || self.children.contains_key(path)
    }

    pub fn update_entry_stat(&mut self, path: &[u8], stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(&(path.to_vec(), 0)) {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// Replace the contents with the flattened form of `tree_oid`
    pub fn read_tree(&mut self, database: &Database, tree_oid: &ObjectId) -> Result<()> {
        let entries = materializer::flatten(database, tree_oid)?;

        self.entries.clear();
        self.children.clear();
        for entry in entries {
            self.store_entry(entry);
        }
        self.mark_changed();
        Ok(())
    }

    /// Store the staged content as trees and return the root tree id
    pub fn write_tree(&self, database: &Database) -> Result<ObjectId> {
        materializer::write_tree(self.entries.values(), database)
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| *stage != 0)
    }

    /// Unmerged paths with their recorded sides, in path order
    pub fn conflicts(&self) -> Vec<ConflictEntry> {
        let mut conflicts = BTreeMap::<&[u8], ConflictEntry>::new();

        for entry in self.entries.values().filter(|e| e.stage != 0) {
            let conflict = conflicts
                .entry(&entry.path)
                .or_insert_with(|| ConflictEntry {
                    path: entry.path.clone(),
                    ancestor: None,
                    ours: None,
                    theirs: None,
                });

            let slot = match entry.stage {
                1 => &mut conflict.ancestor,
                2 => &mut conflict.ours,
                _ => &mut conflict.theirs,
            };
            *slot = Some(entry.clone());
        }

        conflicts.into_values().collect()
    }

    /// Record a conflict; each side's path must name the same file
    pub fn add_conflict(
        &mut self,
        ancestor: Option<IndexEntry>,
        ours: Option<IndexEntry>,
        theirs: Option<IndexEntry>,
    ) -> Result<()> {
        let sides = [(1u8, ancestor), (2, ours), (3, theirs)];
        let path = sides
            .iter()
            .find_map(|(_, side)| side.as_ref().map(|e| e.path.clone()))
            .ok_or_else(|| Error::invalid_spec("conflict needs at least one side"))?;
        validate_path(&path)?;

        if sides
            .iter()
            .filter_map(|(_, side)| side.as_ref())
            .any(|side| side.path != path)
        {
            return Err(Error::invalid_spec("conflict sides name different paths"));
        }
        for side in sides.iter().filter_map(|(_, side)| side.as_ref()) {
            validate_mode(side)?;
        }

        self.remove_all_stages(&path);
        for (stage, side) in sides {
            if let Some(mut side) = side {
                side.stage = stage;
                self.store_entry(side);
            }
        }
        self.mark_changed();
        Ok(())
    }

    /// Drop the unmerged entries of `path`
    pub fn remove_conflict(&mut self, path: &[u8]) -> Result<()> {
        let removed = (1..=3u8)
            .filter_map(|stage| self.remove_entry(path, stage))
            .count();
        if removed == 0 {
            return Err(Error::not_found(format!(
                "conflict for {}",
                String::from_utf8_lossy(path)
            )));
        }
        self.mark_changed();
        Ok(())
    }
}
