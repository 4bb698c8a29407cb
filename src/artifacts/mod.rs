//! Value types and algorithms exchanged by the stores in `areas`
//!
//! - `core`: lock files and trailing checksums
//! - `database`: loose and packed object codecs, the object cache
//! - `index`: index entries, file format and tree materialization
//! - `log`: the revision walker
//! - `objects`: blobs, trees, commits, tags and signatures
//! - `refs`: reference names and values, packed-refs, reflogs, revisions
//! - `status`: working tree status

pub mod core;
pub mod database;
pub mod index;
pub mod log;
pub mod objects;
pub mod refs;
pub mod status;
