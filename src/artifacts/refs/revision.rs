use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::{HEADS_PREFIX, INVALID_REF_NAME_REGEX, REF_ALIASES, TAGS_PREFIX};
use crate::errors::{Error, ErrorKind, Result};

const PEEL_REGEX: &str = r"^(.+)\^\{([a-z]*)\}$";
const PARENT_REGEX: &str = r"^(.+)\^(\d*)$";
const ANCESTOR_REGEX: &str = r"^(.+)~(\d*)$";

/// A parsed revision expression
///
/// Supported forms:
/// - names: `main`, `tags/v1`, `refs/heads/topic`, `HEAD`, `@`
/// - full or abbreviated object ids (a name that matches a reference wins)
/// - `<rev>^` and `<rev>^<n>` for the first or n-th parent, `<rev>^0` for the commit itself
/// - `<rev>~` and `<rev>~<n>` for the n-th first-parent ancestor
/// - `<rev>^{commit}`, `^{tree}`, `^{blob}`, `^{tag}` to peel to a kind, `<rev>^{}` to strip tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A reference name, resolved by trying the usual prefixes, or an object id
    Ref(String),
    /// The n-th parent of a commit (`0` is the commit itself)
    Parent(Box<Revision>, usize),
    /// The n-th generation first-parent ancestor
    Ancestor(Box<Revision>, usize),
    /// Peel to an object of the given kind, or through tags only for `None`
    Peel(Box<Revision>, Option<ObjectType>),
}

impl Revision {
    pub fn try_parse(revision: &str) -> Result<Revision> {
        let compile = |pattern: &str| {
            regex::Regex::new(pattern)
                .map_err(|e| Error::invalid_spec(format!("invalid revision pattern: {e}")))
        };

        if let Some(caps) = compile(PEEL_REGEX)?.captures(revision) {
            let base = Self::try_parse(&caps[1])?;
            let kind = match &caps[2] {
                "" => None,
                kind => Some(ObjectType::try_from(kind).map_err(|_| {
                    Error::invalid_spec(format!("unknown object kind {kind:?} in {revision}"))
                })?),
            };
            return Ok(Revision::Peel(Box::new(base), kind));
        }

        if let Some(caps) = compile(PARENT_REGEX)?.captures(revision) {
            let base = Self::try_parse(&caps[1])?;
            let n = parse_count(&caps[2], revision)?;
            return Ok(Revision::Parent(Box::new(base), n));
        }

        if let Some(caps) = compile(ANCESTOR_REGEX)?.captures(revision) {
            let base = Self::try_parse(&caps[1])?;
            let n = parse_count(&caps[2], revision)?;
            return Ok(Revision::Ancestor(Box::new(base), n));
        }

        let name = *REF_ALIASES.get(revision).unwrap_or(&revision);
        if name.is_empty() || compile(INVALID_REF_NAME_REGEX)?.is_match(name) {
            return Err(Error::invalid_spec(format!("invalid revision: {revision:?}")));
        }
        Ok(Revision::Ref(name.to_string()))
    }

    /// Evaluate the expression to an object id
    pub fn resolve(&self, refs: &Refs, database: &Database) -> Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name, refs, database),
            Revision::Parent(base, n) => {
                let oid = database.peel(&base.resolve(refs, database)?, Some(ObjectType::Commit))?;
                if *n == 0 {
                    return Ok(oid);
                }
                let commit = database.parse_object_as_commit(&oid)?;
                commit.parents().get(n - 1).copied().ok_or_else(|| {
                    Error::not_found(format!("parent {n} of commit {}", oid.to_short_oid()))
                })
            }
            Revision::Ancestor(base, generations) => {
                let mut oid =
                    database.peel(&base.resolve(refs, database)?, Some(ObjectType::Commit))?;
                for _ in 0..*generations {
                    let commit = database.parse_object_as_commit(&oid)?;
                    oid = *commit.parent().ok_or_else(|| {
                        Error::not_found(format!("parent of root commit {}", oid.to_short_oid()))
                    })?;
                }
                Ok(oid)
            }
            Revision::Peel(base, kind) => database.peel(&base.resolve(refs, database)?, *kind),
        }
    }

    fn resolve_name(name: &str, refs: &Refs, database: &Database) -> Result<ObjectId> {
        let candidates = [
            name.to_string(),
            format!("refs/{name}"),
            format!("{TAGS_PREFIX}{name}"),
            format!("{HEADS_PREFIX}{name}"),
        ];

        for candidate in candidates {
            if RefName::try_parse(candidate.as_str()).is_err() {
                continue;
            }
            match refs.resolve_oid(&candidate) {
                Ok(oid) => return Ok(oid),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }

        if Self::looks_like_oid(name) {
            return database.exists_prefix(name);
        }
        Err(Error::not_found(format!("revision {name}")))
    }

    fn looks_like_oid(s: &str) -> bool {
        s.len() >= 4 && s.len() <= OBJECT_ID_LENGTH && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}

fn parse_count(digits: &str, revision: &str) -> Result<usize> {
    if digits.is_empty() {
        return Ok(1);
    }
    digits
        .parse()
        .map_err(|_| Error::invalid_spec(format!("count out of range in {revision}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn name(n: &str) -> Box<Revision> {
        Box::new(Revision::Ref(n.to_string()))
    }

    #[rstest]
    #[case("main", Revision::Ref("main".into()))]
    #[case("@", Revision::Ref("HEAD".into()))]
    #[case("main^", Revision::Parent(name("main"), 1))]
    #[case("main^2", Revision::Parent(name("main"), 2))]
    #[case("main^0", Revision::Parent(name("main"), 0))]
    #[case("main~", Revision::Ancestor(name("main"), 1))]
    #[case("main~3", Revision::Ancestor(name("main"), 3))]
    #[case("v1^{}", Revision::Peel(name("v1"), None))]
    #[case("v1^{tree}", Revision::Peel(name("v1"), Some(ObjectType::Tree)))]
    #[case("@~2^", Revision::Parent(Box::new(Revision::Ancestor(name("HEAD"), 2)), 1))]
    #[case(
        "main^{commit}~1",
        Revision::Ancestor(Box::new(Revision::Peel(name("main"), Some(ObjectType::Commit))), 1)
    )]
    fn parses_revision_expressions(#[case] text: &str, #[case] expected: Revision) {
        assert_eq!(Revision::try_parse(text).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".invalid")]
    #[case("feature..name")]
    #[case("/invalid")]
    #[case("invalid/")]
    #[case("branch.lock")]
    #[case("invalid name")]
    #[case("invalid:name")]
    #[case(".invalid^")]
    #[case(".invalid~5")]
    #[case("main^{bogus}")]
    fn rejects_malformed_revisions(#[case] text: &str) {
        assert!(Revision::try_parse(text).is_err());
    }

    fn valid_name_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9_/-]*[a-zA-Z0-9]")
            .unwrap()
            .prop_filter("no invalid sequences", |s| {
                !s.contains("..") && !s.contains("//") && !s.contains("/-") && s.len() < 256
            })
    }

    proptest! {
        #[test]
        fn parent_suffixes_nest(name in valid_name_strategy(), count in 1usize..5) {
            let text = format!("{name}{}", "^".repeat(count));
            let mut current = Revision::try_parse(&text).unwrap();
            for _ in 0..count {
                match current {
                    Revision::Parent(base, 1) => current = *base,
                    ref other => prop_assert!(false, "unexpected {:?}", other),
                }
            }
            prop_assert_eq!(current, Revision::Ref(name));
        }

        #[test]
        fn ancestor_suffix_keeps_generation(name in valid_name_strategy(), n in 0usize..100) {
            let parsed = Revision::try_parse(&format!("{name}~{n}")).unwrap();
            prop_assert_eq!(parsed, Revision::Ancestor(Box::new(Revision::Ref(name)), n));
        }

        #[test]
        fn hex_strings_parse_as_names(oid in "[0-9a-f]{4,40}") {
            prop_assert_eq!(Revision::try_parse(&oid).unwrap(), Revision::Ref(oid.clone()));
        }
    }
}
