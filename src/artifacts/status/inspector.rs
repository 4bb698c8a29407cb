use crate::areas::workspace::Workspace;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object::hash_object;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::status::file_change::StatusFlags;
use derive_new::new;
use std::mem::discriminant;

/// Pairwise comparisons between the HEAD tree, the index and the working tree
#[derive(new)]
pub struct Inspector<'r> {
    workspace: &'r Workspace,
}

/// Regular file, executable, symlink and gitlink are different kinds; the
/// executable bit alone is a modification
fn kind_changed(a: EntryMode, b: EntryMode) -> bool {
    discriminant(&a) != discriminant(&b)
}

impl Inspector<'_> {
    /// Hash the working tree file the way it would be stored
    ///
    /// `None` when the file cannot be read.
    fn is_content_changed(&self, entry: &IndexEntry) -> Option<bool> {
        let content = self.workspace.read_file(&entry.path).ok()?;
        Some(hash_object(ObjectType::Blob, &content) != entry.oid)
    }

    /// Compare a stage-0 entry with what is on disk at its path
    ///
    /// The stat information is trusted when sizes and timestamps agree;
    /// otherwise the content is hashed.
    pub fn check_index_against_workspace(
        &self,
        entry: &IndexEntry,
        stat: Option<&EntryMetadata>,
    ) -> StatusFlags {
        let Some(stat) = stat else {
            return StatusFlags::WT_DELETED;
        };

        if kind_changed(entry.mode(), stat.mode) {
            return StatusFlags::WT_TYPECHANGE;
        }
        if !entry.stat_match(stat) {
            return StatusFlags::WT_MODIFIED;
        }
        if entry.times_match(stat) {
            return StatusFlags::empty();
        }

        match self.is_content_changed(entry) {
            Some(true) => StatusFlags::WT_MODIFIED,
            Some(false) => StatusFlags::empty(),
            None => StatusFlags::WT_UNREADABLE,
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&IndexEntry>,
    ) -> StatusFlags {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if kind_changed(index_entry.mode(), head_entry.mode()) =>
            {
                StatusFlags::INDEX_TYPECHANGE
            }
            (Some(index_entry), Some(head_entry))
                if index_entry.mode().normalized() != head_entry.mode().normalized()
                    || index_entry.oid != head_entry.oid =>
            {
                StatusFlags::INDEX_MODIFIED
            }
            (Some(_), None) => StatusFlags::INDEX_NEW,
            (None, Some(_)) => StatusFlags::INDEX_DELETED,
            _ => StatusFlags::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object_id::ObjectId;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn entry_for(dir: &TempDir, path: &str, content: &[u8]) -> IndexEntry {
        let abs = dir.path().join(path);
        let metadata = std::fs::symlink_metadata(&abs).unwrap();
        IndexEntry::new(
            path.as_bytes().to_vec(),
            hash_object(ObjectType::Blob, content),
            EntryMetadata::from_fs(&abs, &metadata),
        )
    }

    #[test]
    fn clean_file_matches_by_stat() {
        let dir = TempDir::new().unwrap();
        dir.child("a.txt").write_str("one\n").unwrap();
        let workspace = Workspace::new(dir.path());
        let entry = entry_for(&dir, "a.txt", b"one\n");
        let stat = workspace.stat_file(b"a.txt").unwrap();

        let inspector = Inspector::new(&workspace);
        assert_eq!(
            inspector.check_index_against_workspace(&entry, stat.as_ref()),
            StatusFlags::empty()
        );
        assert_eq!(
            inspector.check_index_against_workspace(&entry, None),
            StatusFlags::WT_DELETED
        );
    }

    #[test]
    fn same_size_edit_is_found_by_hashing() {
        let dir = TempDir::new().unwrap();
        dir.child("a.txt").write_str("one\n").unwrap();
        let workspace = Workspace::new(dir.path());
        let mut entry = entry_for(&dir, "a.txt", b"one\n");
        entry.metadata.mtime = 1;

        dir.child("a.txt").write_str("two\n").unwrap();
        let stat = workspace.stat_file(b"a.txt").unwrap();
        assert_eq!(
            Inspector::new(&workspace).check_index_against_workspace(&entry, stat.as_ref()),
            StatusFlags::WT_MODIFIED
        );
    }

    #[test]
    fn head_comparison() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let inspector = Inspector::new(&workspace);
        let oid = ObjectId::from_bytes([1; 20]);
        let file = IndexEntry::from_tree_entry(b"a".to_vec(), EntryMode::REGULAR, oid);
        let exe = IndexEntry::from_tree_entry(b"a".to_vec(), EntryMode::EXECUTABLE, oid);
        let link = IndexEntry::from_tree_entry(b"a".to_vec(), EntryMode::Symlink, oid);

        assert_eq!(inspector.check_index_against_head_tree(Some(&file), Some(&file)), StatusFlags::empty());
        assert_eq!(inspector.check_index_against_head_tree(Some(&exe), Some(&file)), StatusFlags::INDEX_MODIFIED);
        assert_eq!(inspector.check_index_against_head_tree(Some(&link), Some(&file)), StatusFlags::INDEX_TYPECHANGE);
        assert_eq!(inspector.check_index_against_head_tree(Some(&file), None), StatusFlags::INDEX_NEW);
        assert_eq!(inspector.check_index_against_head_tree(None, Some(&file)), StatusFlags::INDEX_DELETED);
    }
}
