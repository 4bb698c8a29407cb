//! Working tree access
//!
//! Paths handed to and returned by the workspace are slash separated byte
//! strings relative to the working tree root, the same form the index uses.

use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::errors::{Error, Result};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GIT_DIR_NAME: &str = ".git";

/// A file found in the working tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkspaceFile {
    pub path: Vec<u8>,
    /// Matched by a `.gitignore` file or the repository exclude file
    pub ignored: bool,
}

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Workspace { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn abs_path(&self, path: &[u8]) -> PathBuf {
        self.path.join(OsStr::from_bytes(path))
    }

    /// File content, or the link target for a symbolic link
    pub fn read_file(&self, path: &[u8]) -> Result<Vec<u8>> {
        let abs = self.abs_path(path);
        let metadata = std::fs::symlink_metadata(&abs).map_err(|e| Error::io(&abs, e))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&abs).map_err(|e| Error::io(&abs, e))?;
            return Ok(target.as_os_str().as_bytes().to_vec());
        }
        std::fs::read(&abs).map_err(|e| Error::io(&abs, e))
    }

    pub fn parse_blob(&self, path: &[u8]) -> Result<Blob> {
        Ok(Blob::new(self.read_file(path)?))
    }

    /// Stat information for `path`, `None` when nothing exists there
    ///
    /// Symbolic links are not followed.
    pub fn stat_file(&self, path: &[u8]) -> Result<Option<EntryMetadata>> {
        let abs = self.abs_path(path);
        match std::fs::symlink_metadata(&abs) {
            Ok(metadata) if metadata.is_dir() => Ok(None),
            Ok(metadata) => Ok(Some(EntryMetadata::from_fs(&abs, &metadata))),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(Error::io(&abs, e)),
        }
    }

    pub fn is_dir(&self, path: &[u8]) -> bool {
        std::fs::symlink_metadata(self.abs_path(path)).is_ok_and(|m| m.is_dir())
    }

    /// Every file and symbolic link under the root, sorted by path
    ///
    /// `.gitignore` files at every level are honoured, plus `exclude_file`
    /// when given. Ignored files are listed with `ignored` set.
    pub fn list_files(&self, exclude_file: Option<&Path>) -> Result<Vec<WorkspaceFile>> {
        let all = WalkDir::new(&self.path)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != GIT_DIR_NAME)
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_type().is_dir())
            .filter_map(|entry| self.relative(entry.path()))
            .collect::<BTreeSet<_>>();

        let visible = self.visible_files(exclude_file)?;

        Ok(all
            .into_iter()
            .map(|path| WorkspaceFile {
                ignored: !visible.contains(&path),
                path,
            })
            .collect())
    }

    fn visible_files(&self, exclude_file: Option<&Path>) -> Result<BTreeSet<Vec<u8>>> {
        let mut builder = ignore::WalkBuilder::new(&self.path);
        builder
            .hidden(false)
            .parents(false)
            .ignore(false)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .filter_entry(|entry| entry.file_name() != GIT_DIR_NAME);

        if let Some(exclude) = exclude_file.filter(|path| path.is_file())
            && let Some(err) = builder.add_ignore(exclude)
        {
            tracing::warn!("ignoring unreadable exclude file {:?}: {}", exclude, err);
        }

        Ok(builder
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|kind| !kind.is_dir()))
            .filter_map(|entry| self.relative(entry.path()))
            .collect())
    }

    fn relative(&self, path: &Path) -> Option<Vec<u8>> {
        let relative = path.strip_prefix(&self.path).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(relative.as_os_str().as_bytes().to_vec())
    }
}
