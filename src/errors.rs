//! Error taxonomy shared by every store in the crate
//!
//! Each variant names one boundary condition. Callers that only need to branch
//! on the condition can use [`Error::kind`].

use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;

/// All errors produced by the object database, reference store and index.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("ambiguous object prefix {prefix}: {} candidates", candidates.len())]
    Ambiguous {
        prefix: String,
        candidates: Vec<ObjectId>,
    },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("corrupt {what}: {reason}")]
    Corrupt { what: String, reason: String },

    #[error("lock is held: {}", .0.display())]
    Locked(PathBuf),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unborn branch: {0}")]
    UnbornBranch(String),

    #[error("operation requires a working tree: {0}")]
    BareRepo(String),

    #[error("not fast-forward: {name} expected {expected} but found {actual}")]
    NotFastForward {
        name: String,
        expected: String,
        actual: String,
    },
}

/// Fieldless discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Exists,
    Ambiguous,
    InvalidSpec,
    Corrupt,
    Locked,
    Conflict,
    Io,
    UnbornBranch,
    BareRepo,
    NotFastForward,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Exists(_) => ErrorKind::Exists,
            Error::Ambiguous { .. } => ErrorKind::Ambiguous,
            Error::InvalidSpec(_) => ErrorKind::InvalidSpec,
            Error::Corrupt { .. } => ErrorKind::Corrupt,
            Error::Locked(_) => ErrorKind::Locked,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Io { .. } => ErrorKind::Io,
            Error::UnbornBranch(_) => ErrorKind::UnbornBranch,
            Error::BareRepo(_) => ErrorKind::BareRepo,
            Error::NotFastForward { .. } => ErrorKind::NotFastForward,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn exists(what: impl Into<String>) -> Self {
        Self::Exists(what.into())
    }

    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    pub fn corrupt(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error is one of the expected, recoverable outcomes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::Exists | ErrorKind::UnbornBranch
        )
    }
}

// In-memory writers (Vec<u8>, Cursor) have no path to report.
impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
