//! Object database backends and codecs
//!
//! - `loose`: one compressed file per object
//! - `pack`, `pack_index`: packfiles and their v2 indexes
//! - `delta`: delta instructions used inside packs
//! - `pack_writer`: serializes objects into a pack + index
//! - `cache`: bounded in-memory cache of decoded raw objects

pub mod cache;
pub mod delta;
pub mod loose;
pub mod pack;
pub mod pack_index;
pub mod pack_writer;
