//! Core utilities and shared types
//!
//! - `checksum`: trailing SHA-1 of index and pack files
//! - `lockfile`: the `.lock` + rename protocol every on-disk mutation goes through

pub mod checksum;
pub mod lockfile;

/// Random suffix for temporary files written next to their final location
pub(crate) fn temp_name(prefix: &str) -> String {
    format!("{prefix}-{}", fake::rand::random::<u32>())
}
