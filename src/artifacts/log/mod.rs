//! Commit history traversal
//!
//! - `rev_list`: the revision walker
//!
//! ## Algorithm
//!
//! The walk keeps a priority queue ordered by committer timestamp. Hidden
//! commits and their ancestry are marked uninteresting before the first step.
//! Topological order releases a commit only after all its children were
//! emitted (Kahn's algorithm), and reverse order drains the walk first.

pub mod rev_list;
