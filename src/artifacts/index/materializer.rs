//! Conversion between flat index entries and nested tree objects
//!
//! `write_tree` groups entries by their leading directories and writes every
//! directory bottom-up, so each tree object is stored before the tree that
//! names it. `flatten` walks a tree back into stage-0 entries.

use crate::areas::database::Database;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::errors::{Error, Result};
use std::collections::BTreeMap;

#[derive(Debug)]
enum Node {
    Leaf(EntryMode, ObjectId),
    Dir(BTreeMap<Vec<u8>, Node>),
}

impl Node {
    fn insert(&mut self, path: &[u8], mode: EntryMode, oid: ObjectId) -> Result<()> {
        let Node::Dir(children) = self else {
            return Err(collision(path));
        };

        match path.iter().position(|&b| b == b'/') {
            None => {
                if children.contains_key(path) {
                    return Err(collision(path));
                }
                children.insert(path.to_vec(), Node::Leaf(mode, oid));
                Ok(())
            }
            Some(slash) => {
                let child = children
                    .entry(path[..slash].to_vec())
                    .or_insert_with(|| Node::Dir(BTreeMap::new()));
                child.insert(&path[slash + 1..], mode, oid)
            }
        }
    }
}

fn collision(path: &[u8]) -> Error {
    Error::conflict(format!(
        "path {:?} is both a file and a directory",
        String::from_utf8_lossy(path)
    ))
}

/// Store the tree described by `entries` and return the root tree id
pub fn write_tree<'e>(
    entries: impl IntoIterator<Item = &'e IndexEntry>,
    database: &Database,
) -> Result<ObjectId> {
    let mut root = Node::Dir(BTreeMap::new());

    for entry in entries {
        if entry.stage != 0 {
            return Err(Error::conflict(format!(
                "unmerged path {}",
                entry.path_lossy()
            )));
        }
        root.insert(&entry.path, entry.mode(), entry.oid)?;
    }

    match &root {
        Node::Dir(children) => write_dir(children, database),
        Node::Leaf(..) => Err(collision(b"")),
    }
}

fn write_dir(children: &BTreeMap<Vec<u8>, Node>, database: &Database) -> Result<ObjectId> {
    let mut entries = Vec::with_capacity(children.len());

    for (name, node) in children {
        let entry = match node {
            Node::Leaf(mode, oid) => TreeEntry::new(mode.normalized(), name.clone(), *oid),
            Node::Dir(grandchildren) => TreeEntry::new(
                EntryMode::Directory,
                name.clone(),
                write_dir(grandchildren, database)?,
            ),
        };
        entries.push(entry);
    }

    let tree = Tree::from_entries(entries)?;
    database.store(&tree)
}

/// Every non-tree entry reachable from `tree_oid`, at stage 0 with zeroed stat
pub fn flatten(database: &Database, tree_oid: &ObjectId) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    let mut pending = vec![(Vec::new(), *tree_oid)];

    while let Some((prefix, oid)) = pending.pop() {
        let tree = database.parse_object_as_tree(&oid)?;
        // reversed so the stack pops subtrees in tree order
        for entry in tree.entries().iter().rev() {
            let mut path = prefix.clone();
            if !path.is_empty() {
                path.push(b'/');
            }
            path.extend_from_slice(&entry.name);

            if entry.is_tree() {
                pending.push((path, entry.oid));
            } else {
                entries.push(IndexEntry::from_tree_entry(path, entry.mode, entry.oid));
            }
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// The non-tree entry stored at `path` under `tree_oid`, if any
pub fn entry_at(
    database: &Database,
    tree_oid: &ObjectId,
    path: &[u8],
) -> Result<Option<IndexEntry>> {
    let mut tree = database.parse_object_as_tree(tree_oid)?;
    let mut components = path.split(|&b| b == b'/').peekable();

    while let Some(name) = components.next() {
        let Some(entry) = tree.get(name) else {
            return Ok(None);
        };
        match (components.peek().is_some(), entry.is_tree()) {
            (false, false) => {
                return Ok(Some(IndexEntry::from_tree_entry(path, entry.mode, entry.oid)));
            }
            (true, true) => {
                let next = entry.oid;
                tree = database.parse_object_as_tree(&next)?;
            }
            _ => return Ok(None),
        }
    }
    Ok(None)
}
