//! Working tree status
//!
//! - `file_change`: per-path status flags and their short codes
//! - `inspector`: pairwise comparisons of HEAD tree, index and working tree
//! - `status_info`: the joined, path-ordered status of a repository

pub mod file_change;
pub mod inspector;
pub mod status_info;
