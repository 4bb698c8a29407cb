//! Stores bound to a directory on disk
//!
//! - `config`: the repository configuration file
//! - `database`: object database (loose objects and packs)
//! - `index`: staging area
//! - `refs`: branches, tags, HEAD and their reflogs
//! - `repository`: the façade tying the stores to one git directory
//! - `workspace`: working tree file system access

pub mod config;
pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
