use crate::areas::database::Database;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{validate_entry_name, Tree, TreeEntry};
use crate::errors::Result;
use std::collections::BTreeMap;

/// Mutable staging area for a single tree level
///
/// Entries are keyed by name; canonical ordering is applied when the tree is built.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    entries: BTreeMap<Vec<u8>, (EntryMode, ObjectId)>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the entries of an existing tree
    pub fn from_tree(tree: &Tree) -> Self {
        let entries = tree
            .entries()
            .iter()
            .map(|entry| (entry.name.clone(), (entry.mode, entry.oid)))
            .collect();
        TreeBuilder { entries }
    }

    /// Insert or replace the entry called `name`
    pub fn insert(
        &mut self,
        name: impl Into<Vec<u8>>,
        oid: ObjectId,
        mode: EntryMode,
    ) -> Result<Option<TreeEntry>> {
        let name = name.into();
        validate_entry_name(&name)?;

        let previous = self
            .entries
            .insert(name.clone(), (mode.normalized(), oid))
            .map(|(mode, oid)| TreeEntry::new(mode, name, oid));
        Ok(previous)
    }

    pub fn remove(&mut self, name: &[u8]) -> Option<TreeEntry> {
        self.entries
            .remove_entry(name)
            .map(|(name, (mode, oid))| TreeEntry::new(mode, name, oid))
    }

    pub fn get(&self, name: &[u8]) -> Option<TreeEntry> {
        self.entries
            .get(name)
            .map(|(mode, oid)| TreeEntry::new(*mode, name, *oid))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn build(&self) -> Result<Tree> {
        Tree::from_entries(
            self.entries
                .iter()
                .map(|(name, (mode, oid))| TreeEntry::new(*mode, name.as_slice(), *oid)),
        )
    }

    /// Build the tree and store it in the database
    pub fn write(&self, database: &Database) -> Result<ObjectId> {
        let tree = self.build()?;
        database.store(&tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object::Object;
    use pretty_assertions::assert_eq;

    fn oid(fill: u8) -> ObjectId {
        ObjectId::from_bytes([fill; 20])
    }

    #[test]
    fn insertion_order_does_not_change_the_tree() {
        let mut forward = TreeBuilder::new();
        forward.insert("README", oid(1), EntryMode::REGULAR).unwrap();
        forward.insert("src", oid(2), EntryMode::Directory).unwrap();

        let mut reversed = TreeBuilder::new();
        reversed.insert("src", oid(2), EntryMode::Directory).unwrap();
        reversed.insert("README", oid(1), EntryMode::REGULAR).unwrap();

        assert_eq!(
            forward.build().unwrap().object_id().unwrap(),
            reversed.build().unwrap().object_id().unwrap()
        );
    }

    #[test]
    fn insert_replaces_and_remove_returns_entry() {
        let mut builder = TreeBuilder::new();
        assert_eq!(builder.insert("a", oid(1), EntryMode::REGULAR).unwrap(), None);
        let previous = builder.insert("a", oid(2), EntryMode::EXECUTABLE).unwrap();

        assert_eq!(previous, Some(TreeEntry::new(EntryMode::REGULAR, "a", oid(1))));
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.remove(b"a").map(|e| e.oid), Some(oid(2)));
        assert!(builder.is_empty());
    }

    #[test]
    fn rejects_names_with_separators() {
        let mut builder = TreeBuilder::new();
        assert!(builder.insert("a/b", oid(1), EntryMode::REGULAR).is_err());
        assert!(builder.insert("", oid(1), EntryMode::REGULAR).is_err());
    }
}
