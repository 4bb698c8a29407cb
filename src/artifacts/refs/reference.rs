//! Reference values
//!
//! A loose reference file holds either a 40-hex object id or
//! `ref: <name>`, followed by a newline.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use crate::errors::{Error, Result};

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// What a reference points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefTarget {
    Direct(ObjectId),
    Symbolic(RefName),
}

impl RefTarget {
    /// Parse the content of a loose reference file
    pub fn parse(content: &[u8], name: &str) -> Result<Self> {
        let corrupt = |reason: String| Error::corrupt(format!("reference {name}"), reason);
        let content = std::str::from_utf8(content).map_err(|_| corrupt("not utf-8".into()))?;
        let content = content.trim_end_matches(['\n', '\r']);

        let symref = regex::Regex::new(SYMREF_REGEX)
            .map_err(|e| corrupt(format!("invalid symref pattern: {e}")))?;
        if let Some(captures) = symref.captures(content) {
            let target = RefName::try_parse(captures[1].trim())
                .map_err(|e| corrupt(e.to_string()))?;
            return Ok(RefTarget::Symbolic(target));
        }

        ObjectId::try_parse(content)
            .map(RefTarget::Direct)
            .map_err(|_| corrupt(format!("unrecognised content {content:?}")))
    }

    /// Content written to a loose reference file
    pub fn to_file_content(&self) -> String {
        match self {
            RefTarget::Direct(oid) => format!("{oid}\n"),
            RefTarget::Symbolic(name) => format!("ref: {name}\n"),
        }
    }
}

/// A named reference as read from the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    name: RefName,
    target: RefTarget,
    /// Object an annotated tag ultimately points at, when known
    peeled: Option<ObjectId>,
}

impl Reference {
    pub fn new(name: RefName, target: RefTarget) -> Self {
        Reference {
            name,
            target,
            peeled: None,
        }
    }

    pub fn with_peeled(mut self, peeled: Option<ObjectId>) -> Self {
        self.peeled = peeled;
        self
    }

    pub fn name(&self) -> &RefName {
        &self.name
    }

    pub fn target(&self) -> &RefTarget {
        &self.target
    }

    pub fn peeled(&self) -> Option<&ObjectId> {
        self.peeled.as_ref()
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.target, RefTarget::Symbolic(_))
    }

    /// Object id of a direct reference
    pub fn oid(&self) -> Option<&ObjectId> {
        match &self.target {
            RefTarget::Direct(oid) => Some(oid),
            RefTarget::Symbolic(_) => None,
        }
    }

    pub fn symbolic_target(&self) -> Option<&RefName> {
        match &self.target {
            RefTarget::Direct(_) => None,
            RefTarget::Symbolic(name) => Some(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parses_direct_and_symbolic_content() {
        let oid = "ce013625030ba8dba906f756967f9e9ca394464a";
        assert_eq!(
            RefTarget::parse(format!("{oid}\n").as_bytes(), "HEAD").unwrap(),
            RefTarget::Direct(ObjectId::try_parse(oid).unwrap())
        );
        assert_eq!(
            RefTarget::parse(b"ref: refs/heads/master\n", "HEAD").unwrap(),
            RefTarget::Symbolic(RefName::branch("master").unwrap())
        );
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"ref: \n".as_slice())]
    #[case(b"ref: refs/heads/a..b\n".as_slice())]
    #[case(b"ce01362503\n".as_slice())]
    fn rejects_garbage(#[case] content: &[u8]) {
        assert!(RefTarget::parse(content, "refs/heads/x").is_err());
    }

    #[test]
    fn file_content_round_trips() {
        let target = RefTarget::Symbolic(RefName::branch("topic").unwrap());
        assert_eq!(target.to_file_content(), "ref: refs/heads/topic\n");
        assert_eq!(
            RefTarget::parse(target.to_file_content().as_bytes(), "HEAD").unwrap(),
            target
        );
    }
}
