//! Reference logs
//!
//! Each line records one update of a reference:
//! `<old-hex> <new-hex> <signature>\t<message>\n`. Creations use the zero id as
//! the old value and deletions use it as the new value.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::signature::Signature;
use crate::errors::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old_oid: ObjectId,
    pub new_oid: ObjectId,
    pub committer: Signature,
    /// Single-line message; may be empty
    pub message: Vec<u8>,
}

impl ReflogEntry {
    pub fn new(
        old_oid: ObjectId,
        new_oid: ObjectId,
        committer: Signature,
        message: impl AsRef<[u8]>,
    ) -> Self {
        ReflogEntry {
            old_oid,
            new_oid,
            committer,
            message: normalize_message(message.as_ref()),
        }
    }

    pub fn message_lossy(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut line = format!("{} {} ", self.old_oid, self.new_oid).into_bytes();
        line.extend_from_slice(&self.committer.encode());
        line.push(b'\t');
        line.extend_from_slice(&self.message);
        line.push(b'\n');
        line
    }

    pub fn parse(line: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| Error::corrupt("reflog", reason.to_string());

        let (record, message) = match line.iter().position(|&b| b == b'\t') {
            Some(tab) => (&line[..tab], &line[tab + 1..]),
            None => (line, &b""[..]),
        };
        if record.len() < 82 || record[40] != b' ' || record[81] != b' ' {
            return Err(corrupt("malformed record"));
        }

        let hex = |range: std::ops::Range<usize>| {
            std::str::from_utf8(&record[range])
                .ok()
                .and_then(|hex| ObjectId::try_parse(hex).ok())
                .ok_or_else(|| corrupt("bad object id"))
        };

        Ok(ReflogEntry {
            old_oid: hex(0..40)?,
            new_oid: hex(41..81)?,
            committer: Signature::parse(&record[82..])?,
            message: message.to_vec(),
        })
    }
}

/// Messages are stored on one line; line breaks become spaces
fn normalize_message(message: &[u8]) -> Vec<u8> {
    let trimmed = message
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(&b""[..], |end| &message[..=end]);
    trimmed
        .iter()
        .map(|&b| if b == b'\n' || b == b'\r' { b' ' } else { b })
        .collect()
}

/// Every entry of the log at `path`, oldest first; no file means no entries
pub fn read(path: &Path) -> Result<Vec<ReflogEntry>> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(path, e)),
    };

    content
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(ReflogEntry::parse)
        .collect()
}

/// Append `entry` to the log at `path`, creating the file and its directories
pub fn append(path: &Path, entry: &ReflogEntry) -> Result<()> {
    ReflogWriter::open(path)?.append(entry)
}

/// A log opened for appending
///
/// Opening creates the file and its directories, so a reference update can
/// open its log before it commits and only write the record afterwards.
#[derive(Debug)]
pub struct ReflogWriter {
    path: PathBuf,
    file: File,
}

impl ReflogWriter {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(ReflogWriter {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn append(&mut self, entry: &ReflogEntry) -> Result<()> {
        self.file
            .write_all(&entry.encode())
            .map_err(|e| Error::io(&self.path, e))
    }
}
