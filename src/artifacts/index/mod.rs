//! Git index file format
//!
//! The index (also called staging area or cache) stores information about the working tree.
//! It tracks which files should be included in the next commit.
//!
//! ## File Format
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2, 3 or 4 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - Sorted by (path, stage)
//!   - Versions 2 and 3 pad each entry with NULs to 8-byte alignment
//!   - Version 3 adds a second flags word to entries that need it
//!   - Version 4 stores each path relative to the previous one
//!
//! Extensions (optional):
//!   - 4-byte signature, 4-byte length, payload
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod entry_mode;
pub mod extension;
pub mod index_entry;
pub mod index_header;
pub mod materializer;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12;

/// Magic signature identifying index files
pub const SIGNATURE: &[u8; 4] = b"DIRC";

/// Version written for a fresh index
pub const DEFAULT_VERSION: u32 = 2;

pub const MIN_VERSION: u32 = 2;
pub const MAX_VERSION: u32 = 4;
