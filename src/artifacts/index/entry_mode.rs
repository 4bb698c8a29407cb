//! File modes shared by tree entries and index entries

use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use std::fs::Metadata;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
    /// Legacy `100664`, only ever read from old trees
    GroupWritable,
}

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    #[default]
    Directory,
    Symlink,
    /// Submodule commit
    Gitlink,
}

impl EntryMode {
    pub const REGULAR: EntryMode = EntryMode::File(FileMode::Regular);
    pub const EXECUTABLE: EntryMode = EntryMode::File(FileMode::Executable);

    /// Octal text as written inside tree objects (directories have no leading zero)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::File(FileMode::GroupWritable) => "100664",
            EntryMode::Directory => "40000",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::File(FileMode::GroupWritable) => 0o100664,
            EntryMode::Directory => 0o40000,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    /// Mode written by new trees: `100664` collapses to `100644`
    pub fn normalized(self) -> Self {
        match self {
            EntryMode::File(FileMode::GroupWritable) => EntryMode::REGULAR,
            other => other,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, EntryMode::File(_))
    }

    /// Kind of object an entry with this mode points at
    pub fn object_type(&self) -> ObjectType {
        match self {
            EntryMode::Directory => ObjectType::Tree,
            EntryMode::Gitlink => ObjectType::Commit,
            EntryMode::File(_) | EntryMode::Symlink => ObjectType::Blob,
        }
    }

    /// Parse the mode text of a tree entry, accepting only the canonical spelling
    pub fn parse_tree_mode(text: &[u8]) -> Result<Self> {
        match text {
            b"100644" => Ok(EntryMode::File(FileMode::Regular)),
            b"100755" => Ok(EntryMode::File(FileMode::Executable)),
            b"100664" => Ok(EntryMode::File(FileMode::GroupWritable)),
            b"40000" => Ok(EntryMode::Directory),
            b"120000" => Ok(EntryMode::Symlink),
            b"160000" => Ok(EntryMode::Gitlink),
            _ => Err(Error::corrupt(
                "tree",
                format!("invalid entry mode {:?}", String::from_utf8_lossy(text)),
            )),
        }
    }

    /// Mode a working tree file would be staged with
    pub fn from_metadata(path: &std::path::Path, metadata: &Metadata) -> Self {
        if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if metadata.is_dir() {
            EntryMode::Directory
        } else if is_executable::is_executable(path) {
            EntryMode::EXECUTABLE
        } else {
            EntryMode::REGULAR
        }
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = Error;

    fn try_from(mode: u32) -> Result<Self> {
        match mode {
            0o100644 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            0o100664 => Ok(EntryMode::File(FileMode::GroupWritable)),
            0o40000 => Ok(EntryMode::Directory),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Gitlink),
            _ => Err(Error::invalid_spec(format!("invalid entry mode {mode:o}"))),
        }
    }
}

impl From<EntryMode> for u32 {
    fn from(mode: EntryMode) -> Self {
        mode.as_u32()
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0o100644, "100644")]
    #[case(0o100755, "100755")]
    #[case(0o100664, "100664")]
    #[case(0o40000, "40000")]
    #[case(0o120000, "120000")]
    #[case(0o160000, "160000")]
    fn numeric_and_tree_text_agree(#[case] raw: u32, #[case] text: &str) {
        let mode = EntryMode::try_from(raw).unwrap();
        assert_eq!(mode.as_str(), text);
        assert_eq!(EntryMode::parse_tree_mode(text.as_bytes()).unwrap(), mode);
    }

    #[rstest]
    #[case("040000")]
    #[case("100600")]
    #[case("0100644")]
    fn rejects_non_canonical_tree_modes(#[case] text: &str) {
        assert!(EntryMode::parse_tree_mode(text.as_bytes()).is_err());
    }

    #[test]
    fn group_writable_normalizes_to_regular() {
        let mode = EntryMode::try_from(0o100664).unwrap();
        assert_eq!(mode.normalized(), EntryMode::REGULAR);
        assert_eq!(EntryMode::Gitlink.object_type(), ObjectType::Commit);
    }
}
