//! A git object store, reference store and index in pure Rust
//!
//! [`Repository`] is the entry point: it opens or creates a repository and
//! hands out the object database, the reference store, the index and the
//! configuration. Every mutation on disk goes through a `.lock` file or a
//! temporary file renamed into place, so readers never see partial writes.
//!
//! ```no_run
//! use bit_core::{Repository, Signature, Sort};
//!
//! # fn main() -> bit_core::Result<()> {
//! let repo = Repository::init("/tmp/example", true)?;
//! let blob = repo.create_blob(b"hello\n")?;
//! let mut tree = repo.create_tree_builder(None)?;
//! tree.insert("hello.txt", blob, bit_core::EntryMode::REGULAR)?;
//! let tree = tree.write(repo.database())?;
//!
//! let me = Signature::new("Me", "me@example.com", 1_700_000_000, 0)?;
//! let commit = repo.create_commit(Some("HEAD"), &me, &me, "first\n", &tree, &[])?;
//! for oid in repo.walk(&commit, Sort::TIME)? {
//!     println!("{}", oid?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod areas;
pub mod artifacts;
pub mod errors;

pub use areas::config::Config;
pub use areas::database::Database;
pub use areas::index::Index;
pub use areas::refs::{LogPolicy, RefLogMessage, Refs};
pub use areas::repository::{ObjectHandle, Repository};
pub use areas::workspace::Workspace;
pub use artifacts::index::entry_mode::EntryMode;
pub use artifacts::log::rev_list::{RevWalk, Sort, WalkState};
pub use artifacts::objects::object::ObjectBox;
pub use artifacts::objects::object_id::ObjectId;
pub use artifacts::objects::object_type::ObjectType;
pub use artifacts::objects::signature::Signature;
pub use artifacts::refs::reference::{RefTarget, Reference};
pub use artifacts::status::file_change::StatusFlags;
pub use artifacts::status::status_info::{StatusInfo, StatusOptions};
pub use errors::{Error, ErrorKind, Result};
