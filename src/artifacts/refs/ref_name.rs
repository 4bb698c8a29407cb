use crate::artifacts::refs::{
    HEADS_PREFIX, INVALID_REF_NAME_REGEX, ONE_LEVEL_REF_NAME_REGEX, REMOTES_PREFIX, TAGS_PREFIX,
};
use crate::errors::{Error, Result};
use std::path::{Path, PathBuf};

/// A syntactically valid reference name such as `refs/heads/main` or `HEAD`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    pub fn try_parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_spec("reference name cannot be empty"));
        }
        if name == "@" {
            return Err(Error::invalid_spec("'@' is not a valid reference name"));
        }

        let invalid = regex::Regex::new(INVALID_REF_NAME_REGEX)
            .map_err(|e| Error::invalid_spec(format!("invalid reference name pattern: {e}")))?;
        if invalid.is_match(&name) {
            return Err(Error::invalid_spec(format!("invalid reference name: {name}")));
        }

        if !name.contains('/') {
            let one_level = regex::Regex::new(ONE_LEVEL_REF_NAME_REGEX).map_err(|e| {
                Error::invalid_spec(format!("invalid reference name pattern: {e}"))
            })?;
            if !one_level.is_match(&name) {
                return Err(Error::invalid_spec(format!(
                    "one-level reference name must be upper case: {name}"
                )));
            }
        }

        Ok(Self(name))
    }

    /// `refs/heads/<short>` for a branch short name
    pub fn branch(short: &str) -> Result<Self> {
        Self::try_parse(format!("{HEADS_PREFIX}{short}"))
    }

    /// `refs/tags/<short>` for a tag short name
    pub fn tag(short: &str) -> Result<Self> {
        Self::try_parse(format!("{TAGS_PREFIX}{short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location relative to the git directory
    pub fn as_ref_path(&self) -> PathBuf {
        Path::new(&self.0).to_path_buf()
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAGS_PREFIX)
    }

    /// Lives under `refs/` rather than directly in the git directory
    pub fn is_namespaced(&self) -> bool {
        self.0.starts_with("refs/")
    }

    /// `other` sits below this name, as `refs/heads/a/b` does below `refs/heads/a`
    pub fn is_ancestor_of(&self, other: &RefName) -> bool {
        other
            .0
            .strip_prefix(&self.0)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Human-friendly form: `main` for `refs/heads/main`
    pub fn shorthand(&self) -> &str {
        [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RefName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_parse(s)
    }
}
