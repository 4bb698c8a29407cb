use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::index::materializer;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::StatusFlags;
use crate::artifacts::status::inspector::Inspector;
use crate::errors::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub type HeadTree = BTreeMap<Vec<u8>, IndexEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOptions {
    pub include_untracked: bool,
    pub include_ignored: bool,
}

impl Default for StatusOptions {
    fn default() -> Self {
        StatusOptions {
            include_untracked: true,
            include_ignored: false,
        }
    }
}

/// Paths whose status is not current, in path order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInfo {
    entries: BTreeMap<Vec<u8>, StatusFlags>,
}

impl StatusInfo {
    pub fn get(&self, path: &[u8]) -> Option<StatusFlags> {
        self.entries.get(path).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], StatusFlags)> {
        self.entries.iter().map(|(path, flags)| (path.as_slice(), *flags))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nothing staged, modified, untracked or conflicted; ignored files don't count
    pub fn is_clean(&self) -> bool {
        self.entries.values().all(|flags| *flags == StatusFlags::IGNORED)
    }

    pub fn into_map(self) -> BTreeMap<Vec<u8>, StatusFlags> {
        self.entries
    }

    fn record(&mut self, path: &[u8], flags: StatusFlags) {
        if !flags.is_empty() {
            *self.entries.entry(path.to_vec()).or_default() |= flags;
        }
    }
}

/// Joins HEAD tree vs index, index vs working tree, and working tree vs ignore rules
pub struct Status<'r> {
    database: &'r Database,
    workspace: &'r Workspace,
    exclude_file: Option<PathBuf>,
    options: StatusOptions,
}

impl<'r> Status<'r> {
    pub fn new(database: &'r Database, workspace: &'r Workspace) -> Self {
        Status {
            database,
            workspace,
            exclude_file: None,
            options: StatusOptions::default(),
        }
    }

    /// Extra ignore patterns, usually `info/exclude` in the git directory
    pub fn with_exclude_file(mut self, exclude_file: impl Into<PathBuf>) -> Self {
        self.exclude_file = Some(exclude_file.into());
        self
    }

    pub fn with_options(mut self, options: StatusOptions) -> Self {
        self.options = options;
        self
    }

    fn load_head_tree(&self, head_tree: Option<&ObjectId>) -> Result<HeadTree> {
        let Some(tree_oid) = head_tree else {
            return Ok(HeadTree::new());
        };
        Ok(materializer::flatten(self.database, tree_oid)?
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect())
    }

    /// Status of every path that differs somewhere
    ///
    /// Entries whose content turns out unchanged get their stat information
    /// refreshed in `index`, so the next run can skip hashing them.
    pub fn initialize(&self, index: &mut Index, head_tree: Option<&ObjectId>) -> Result<StatusInfo> {
        let inspector = Inspector::new(self.workspace);
        let head_tree = self.load_head_tree(head_tree)?;
        let mut info = StatusInfo::default();

        let conflicted: BTreeSet<Vec<u8>> = index
            .entries()
            .filter(|entry| entry.stage != 0)
            .map(|entry| entry.path.clone())
            .collect();
        for path in &conflicted {
            info.record(path, StatusFlags::CONFLICTED);
        }

        let staged: Vec<IndexEntry> = index
            .entries()
            .filter(|entry| entry.stage == 0)
            .cloned()
            .collect();
        for entry in &staged {
            info.record(
                &entry.path,
                inspector.check_index_against_head_tree(Some(entry), head_tree.get(&entry.path)),
            );

            let flags = match self.workspace.stat_file(&entry.path) {
                Ok(stat) => {
                    let flags = inspector.check_index_against_workspace(entry, stat.as_ref());
                    if let Some(stat) = stat
                        && flags.is_empty()
                        && !entry.times_match(&stat)
                    {
                        index.update_entry_stat(&entry.path, stat);
                    }
                    flags
                }
                Err(e) => {
                    tracing::debug!("cannot stat {}: {}", entry.path_lossy(), e);
                    StatusFlags::WT_UNREADABLE
                }
            };
            info.record(&entry.path, flags);
        }

        for path in head_tree.keys() {
            if index.get(path, 0).is_none() && !conflicted.contains(path) {
                info.record(path, StatusFlags::INDEX_DELETED);
            }
        }

        if self.options.include_untracked || self.options.include_ignored {
            for file in self.workspace.list_files(self.exclude_file.as_deref())? {
                if is_tracked(index, &file.path) {
                    continue;
                }
                if file.ignored {
                    if self.options.include_ignored {
                        info.record(&file.path, StatusFlags::IGNORED);
                    }
                } else if self.options.include_untracked {
                    info.record(&file.path, StatusFlags::WT_NEW);
                }
            }
        }

        Ok(info)
    }

    /// Status of a single path; `NotFound` when no area knows it
    pub fn file(&self, index: &Index, head_tree: Option<&ObjectId>, path: &[u8]) -> Result<StatusFlags> {
        if (1..=3).any(|stage| index.get(path, stage).is_some()) {
            return Ok(StatusFlags::CONFLICTED);
        }

        let inspector = Inspector::new(self.workspace);
        let head_entry = match head_tree {
            Some(tree_oid) => materializer::entry_at(self.database, tree_oid, path)?,
            None => None,
        };
        let index_entry = index.get(path, 0);
        let stat = self.workspace.stat_file(path);

        let mut flags = inspector.check_index_against_head_tree(index_entry, head_entry.as_ref());
        match (index_entry, stat) {
            (Some(entry), Ok(stat)) => {
                flags |= inspector.check_index_against_workspace(entry, stat.as_ref());
            }
            (Some(_), Err(_)) => flags |= StatusFlags::WT_UNREADABLE,
            (None, Ok(Some(_))) => {
                let ignored = self
                    .workspace
                    .list_files(self.exclude_file.as_deref())?
                    .into_iter()
                    .find(|file| file.path == path)
                    .is_some_and(|file| file.ignored);
                flags |= if ignored {
                    StatusFlags::IGNORED
                } else {
                    StatusFlags::WT_NEW
                };
            }
            (None, Ok(None)) if head_entry.is_none() => {
                return Err(Error::not_found(format!(
                    "path {}",
                    String::from_utf8_lossy(path)
                )));
            }
            (None, _) => {}
        }
        Ok(flags)
    }
}

fn is_tracked(index: &Index, path: &[u8]) -> bool {
    (0..=3).any(|stage| index.get(path, stage).is_some())
}
