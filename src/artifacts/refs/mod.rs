//! Reference values and their on-disk encodings
//!
//! - `ref_name`: validated reference names
//! - `reference`: direct and symbolic reference values
//! - `packed_refs`: the consolidated `packed-refs` file
//! - `reflog`: per-reference update logs
//! - `revision`: revision expressions such as `main~2^{tree}`

pub mod packed_refs;
pub mod ref_name;
pub mod reference;
pub mod reflog;
pub mod revision;

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Maximum number of symbolic hops followed while resolving a reference
pub const MAX_SYMREF_DEPTH: usize = 5;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";
pub const NOTES_PREFIX: &str = "refs/notes/";

/// Patterns no reference name may contain
pub const INVALID_REF_NAME_REGEX: &str =
    r"^\.|/\.|\.\.|^/|/$|//|\.lock(/|$)|\.$|^-|/-|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// Shape of names stored directly under the git directory
pub const ONE_LEVEL_REF_NAME_REGEX: &str = r"^[A-Z_]+$";

pub const REF_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "@" => "HEAD",
};
