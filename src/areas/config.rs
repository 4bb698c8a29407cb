//! Repository configuration (`<git-dir>/config`)
//!
//! ```text
//! [core]
//!     repositoryformatversion = 0
//!     bare                       ; a key without a value is true
//! [remote "origin"]
//!     url = "https://example.com/repo.git"   # quoted, with \" \\ \n \t escapes
//! ```
//!
//! Section and key names are case-insensitive, subsection names are not.
//! When a key appears more than once the last occurrence wins. Lines are
//! kept as read, so comments and layout survive a rewrite.

use crate::artifacts::core::lockfile::Lockfile;
use crate::errors::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Key {
    section: String,
    subsection: Option<String>,
    name: String,
}

impl Key {
    /// `section.name` or `section.subsection.name`; the subsection may contain dots
    fn parse(key: &str) -> Result<Key> {
        let invalid = || Error::invalid_spec(format!("invalid config key {key:?}"));

        let (head, name) = key.rsplit_once('.').ok_or_else(invalid)?;
        let (section, subsection) = match head.split_once('.') {
            Some((section, subsection)) => (section, Some(subsection.to_string())),
            None => (head, None),
        };
        if !is_valid_section(section) || !is_valid_name(name) {
            return Err(invalid());
        }

        Ok(Key {
            section: section.to_ascii_lowercase(),
            subsection,
            name: name.to_ascii_lowercase(),
        })
    }

    fn in_section(&self, section: &str, subsection: Option<&str>) -> bool {
        self.section == section && self.subsection.as_deref() == subsection
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Header {
        section: String,
        subsection: Option<String>,
        raw: Option<String>,
    },
    Entry {
        key: Key,
        value: Option<String>,
        raw: Option<String>,
    },
    Blank(String),
}

impl Line {
    fn render(&self) -> String {
        match self {
            Line::Header { raw: Some(raw), .. } | Line::Entry { raw: Some(raw), .. } => raw.clone(),
            Line::Blank(raw) => raw.clone(),
            Line::Header {
                section,
                subsection,
                raw: None,
            } => match subsection {
                Some(subsection) => format!("[{section} \"{}\"]", escape(subsection)),
                None => format!("[{section}]"),
            },
            Line::Entry {
                key,
                value,
                raw: None,
            } => match value {
                Some(value) => format!("\t{} = {}", key.name, quote(value)),
                None => format!("\t{}", key.name),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    lines: Vec<Line>,
    changed: bool,
}

impl Config {
    /// An empty configuration that will be written to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Config {
            path: path.into(),
            lines: Vec::new(),
            changed: false,
        }
    }

    /// Read `path`; a missing file is an empty configuration
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(e) => return Err(Error::io(&path, e)),
        };

        let mut config = Self::parse(&content, &path)?;
        config.path = path;
        Ok(config)
    }

    pub fn parse(content: &[u8], origin: &Path) -> Result<Self> {
        let content = std::str::from_utf8(content)
            .map_err(|_| Error::corrupt(origin.display().to_string(), "not utf-8"))?;
        let corrupt = |number: usize, reason: &str| {
            Error::corrupt(
                origin.display().to_string(),
                format!("line {}: {reason}", number + 1),
            )
        };

        let mut lines = Vec::new();
        let mut current: Option<(String, Option<String>)> = None;

        for (number, raw) in content.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                lines.push(Line::Blank(raw.to_string()));
                continue;
            }

            if trimmed.starts_with('[') {
                let (section, subsection) =
                    parse_header(trimmed).map_err(|reason| corrupt(number, reason))?;
                current = Some((section.clone(), subsection.clone()));
                lines.push(Line::Header {
                    section,
                    subsection,
                    raw: Some(raw.to_string()),
                });
                continue;
            }

            let Some((section, subsection)) = current.as_ref() else {
                return Err(corrupt(number, "key outside of a section"));
            };
            let (name, value) = match trimmed.split_once('=') {
                Some((name, value)) => (
                    name.trim(),
                    Some(parse_value(value).map_err(|reason| corrupt(number, reason))?),
                ),
                None => (trimmed, None),
            };
            if !is_valid_name(name) {
                return Err(corrupt(number, "invalid key name"));
            }

            lines.push(Line::Entry {
                key: Key {
                    section: section.clone(),
                    subsection: subsection.clone(),
                    name: name.to_ascii_lowercase(),
                },
                value,
                raw: Some(raw.to_string()),
            });
        }

        Ok(Config {
            path: origin.to_path_buf(),
            lines,
            changed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// `Some(None)` for a key present without a value
    fn lookup(&self, key: &str) -> Result<Option<Option<&str>>> {
        let key = Key::parse(key)?;
        Ok(self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if *k == key => Some(value.as_deref()),
            _ => None,
        }))
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.lookup(key)? {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => Err(Error::invalid_spec(format!("missing value for {key}"))),
            None => Ok(None),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.lookup(key)? else {
            return Ok(None);
        };
        let Some(value) = value else {
            return Ok(Some(true));
        };

        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(Some(true)),
            "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => parse_int(value)
                .map(|n| Some(n != 0))
                .map_err(|_| Error::invalid_spec(format!("bad boolean value {value:?} for {key}"))),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get_str(key)? {
            Some(value) => parse_int(value)
                .map(Some)
                .map_err(|_| Error::invalid_spec(format!("bad numeric value {value:?} for {key}"))),
            None => Ok(None),
        }
    }

    /// Replace the last occurrence of `key`, or add it to its section
    pub fn set_str(&mut self, key: &str, value: &str) -> Result<()> {
        let key = Key::parse(key)?;
        let entry = Line::Entry {
            key: key.clone(),
            value: Some(value.to_string()),
            raw: None,
        };

        let existing = self
            .lines
            .iter()
            .rposition(|line| matches!(line, Line::Entry { key: k, .. } if *k == key));
        if let Some(position) = existing {
            self.lines[position] = entry;
        } else if let Some(end) = self.section_end(&key) {
            self.lines.insert(end, entry);
        } else {
            self.lines.push(Line::Header {
                section: key.section.clone(),
                subsection: key.subsection.clone(),
                raw: None,
            });
            self.lines.push(entry);
        }

        self.changed = true;
        Ok(())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.set_str(key, if value { "true" } else { "false" })
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.set_str(key, &value.to_string())
    }

    /// Remove every occurrence of `key`; `NotFound` when there is none
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let key = Key::parse(key)?;
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, Line::Entry { key: k, .. } if *k == key));
        if self.lines.len() == before {
            return Err(Error::not_found(format!("config key {key:?}")));
        }
        self.changed = true;
        Ok(())
    }

    /// Position just after the last line of the last header for the key's section
    fn section_end(&self, key: &Key) -> Option<usize> {
        let header = self.lines.iter().rposition(|line| {
            matches!(line, Line::Header { section, subsection, .. }
                if key.in_section(section, subsection.as_deref()))
        })?;
        let next_header = self.lines[header + 1..]
            .iter()
            .position(|line| matches!(line, Line::Header { .. }))
            .map_or(self.lines.len(), |offset| header + 1 + offset);

        // keep trailing comments and blank lines with the next section
        let last_entry = self.lines[header + 1..next_header]
            .iter()
            .rposition(|line| matches!(line, Line::Entry { .. }))
            .map_or(header, |offset| header + 1 + offset);
        Some(last_entry + 1)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.render());
            out.push('\n');
        }
        out
    }

    /// Persist through the `.lock` protocol
    pub fn write(&mut self) -> Result<()> {
        let mut lock = Lockfile::acquire(&self.path)?;
        lock.write_all(self.to_text().as_bytes())
            .map_err(|e| Error::io(lock.lock_path(), e))?;
        lock.commit()?;

        tracing::debug!("wrote config {:?}", self.path);
        self.changed = false;
        Ok(())
    }
}

fn is_valid_section(section: &str) -> bool {
    !section.is_empty()
        && section
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// `[section]`, `[section "subsection"]` or the older `[section.subsection]`
fn parse_header(line: &str) -> std::result::Result<(String, Option<String>), &'static str> {
    let inner = line.strip_prefix('[').ok_or("missing '['")?;
    let name_end = inner
        .find(|c: char| c == ']' || c.is_whitespace())
        .ok_or("unterminated section header")?;
    let name = &inner[..name_end];
    let mut rest = inner[name_end..].trim_start();

    let (section, subsection) = if let Some(after_quote) = rest.strip_prefix('"') {
        let mut subsection = String::new();
        let mut chars = after_quote.char_indices();
        let close = loop {
            match chars.next() {
                Some((i, '"')) => break i,
                Some((_, '\\')) => match chars.next() {
                    Some((_, c)) => subsection.push(c),
                    None => return Err("unterminated subsection"),
                },
                Some((_, c)) => subsection.push(c),
                None => return Err("unterminated subsection"),
            }
        };
        rest = &after_quote[close + 1..];
        (name.to_string(), Some(subsection))
    } else if let Some((section, subsection)) = name.split_once('.') {
        (section.to_string(), Some(subsection.to_ascii_lowercase()))
    } else {
        (name.to_string(), None)
    };

    let trailer = rest.strip_prefix(']').ok_or("missing ']'")?.trim();
    if !(trailer.is_empty() || trailer.starts_with('#') || trailer.starts_with(';')) {
        return Err("unexpected text after section header");
    }
    if !is_valid_section(&section) {
        return Err("invalid section name");
    }
    Ok((section.to_ascii_lowercase(), subsection))
}

/// Unquote a value, dropping comments and surrounding whitespace
fn parse_value(raw: &str) -> std::result::Result<String, &'static str> {
    let mut value = String::new();
    let mut pending_space = String::new();
    let mut quoted = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if !quoted && (c == '#' || c == ';') {
            break;
        }
        if !quoted && c.is_whitespace() {
            if !value.is_empty() {
                pending_space.push(c);
            }
            continue;
        }
        value.push_str(&pending_space);
        pending_space.clear();

        match c {
            '"' => quoted = !quoted,
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('b') => value.push('\u{8}'),
                Some(c @ ('"' | '\\')) => value.push(c),
                Some(_) => return Err("invalid escape sequence"),
                None => return Err("line continuation is not supported"),
            },
            c => value.push(c),
        }
    }

    if quoted {
        return Err("unterminated quote");
    }
    Ok(value)
}

fn parse_int(value: &str) -> std::result::Result<i64, ()> {
    let value = value.trim();
    let (digits, factor) = match value.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&value[..value.len() - 1], 1024),
        Some('m') => (&value[..value.len() - 1], 1024 * 1024),
        Some('g') => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value, 1),
    };
    digits
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(factor))
        .ok_or(())
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            c => out.push(c),
        }
    }
    out
}

fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';']);
    let escaped = escape(value);
    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    const SAMPLE: &str = "\
# global settings
[core]
\trepositoryformatversion = 0
\tbare
\tlogAllRefUpdates = false ; trailing comment
[user]
\tname = \"A \\\"quoted\\\" name\"
\temail = a@example.com
[remote \"Origin\"]
\turl = https://example.com/repo.git
[Pack]
\twindowMemory = 10m
[core]
\tbare = no
";

    fn sample() -> Config {
        Config::parse(SAMPLE.as_bytes(), Path::new("config")).unwrap()
    }

    #[test]
    fn reads_values_with_last_occurrence_winning() {
        let config = sample();
        assert_eq!(config.get_int("core.repositoryformatversion").unwrap(), Some(0));
        assert_eq!(config.get_bool("core.bare").unwrap(), Some(false));
        assert_eq!(config.get_bool("CORE.LogAllRefUpdates").unwrap(), Some(false));
        assert_eq!(config.get_str("user.name").unwrap(), Some("A \"quoted\" name"));
        assert_eq!(config.get_int("pack.windowmemory").unwrap(), Some(10 * 1024 * 1024));
        assert_eq!(config.get_str("user.missing").unwrap(), None);
    }

    #[test]
    fn subsections_are_case_sensitive() {
        let config = sample();
        assert_eq!(
            config.get_str("remote.Origin.url").unwrap(),
            Some("https://example.com/repo.git")
        );
        assert_eq!(config.get_str("remote.origin.url").unwrap(), None);
    }

    #[rstest]
    #[case("true", true)]
    #[case("Yes", true)]
    #[case("on", true)]
    #[case("1", true)]
    #[case("false", false)]
    #[case("off", false)]
    #[case("0", false)]
    fn boolean_words(#[case] text: &str, #[case] expected: bool) {
        let config = Config::parse(format!("[a]\nb = {text}\n").as_bytes(), Path::new("c")).unwrap();
        assert_eq!(config.get_bool("a.b").unwrap(), Some(expected));
    }

    #[rstest]
    #[case("b = maybe")]
    #[case("b = 12x")]
    fn malformed_booleans_are_rejected(#[case] line: &str) {
        let config = Config::parse(format!("[a]\n{line}\n").as_bytes(), Path::new("c")).unwrap();
        assert_eq!(config.get_bool("a.b").unwrap_err().kind(), ErrorKind::InvalidSpec);
    }

    #[rstest]
    #[case("key = value\n")]
    #[case("[core\n")]
    #[case("[core]\nname = \"open\n")]
    #[case("[core]\n1name = x\n")]
    fn malformed_files_are_corrupt(#[case] text: &str) {
        let err = Config::parse(text.as_bytes(), Path::new("c")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn legacy_dotted_header_lowercases_the_subsection() {
        let config = Config::parse(b"[branch.Main]\nremote = origin\n", Path::new("c")).unwrap();
        assert_eq!(config.get_str("branch.main.remote").unwrap(), Some("origin"));
    }

    #[test]
    fn set_keeps_comments_and_appends_to_the_right_section() {
        let mut config = sample();
        config.set_str("user.email", "b@example.com").unwrap();
        config.set_str("user.signingkey", "ABC").unwrap();
        config.set_bool("init.bare", true).unwrap();

        let text = config.to_text();
        assert!(text.starts_with("# global settings\n[core]\n"));
        assert!(text.contains("\temail = b@example.com\n\tsigningkey = ABC\n[remote"));
        assert!(text.ends_with("[init]\n\tbare = true\n"));
        assert!(config.is_changed());
    }

    #[test]
    fn write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("config");
        let mut config = Config::new(path.path());
        config.set_int("core.repositoryformatversion", 0).unwrap();
        config.set_str("user.name", " padded # name ").unwrap();
        config.write().unwrap();

        let loaded = Config::load(path.path()).unwrap();
        assert_eq!(loaded.get_int("core.repositoryformatversion").unwrap(), Some(0));
        assert_eq!(loaded.get_str("user.name").unwrap(), Some(" padded # name "));
        assert!(!dir.child("config.lock").exists());
    }

    #[test]
    fn unset_removes_every_occurrence() {
        let mut config = sample();
        config.unset("core.bare").unwrap();
        assert_eq!(config.get_bool("core.bare").unwrap(), None);
        assert_eq!(config.unset("core.bare").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("config")).unwrap();
        assert_eq!(config.get_str("user.name").unwrap(), None);
    }

    proptest! {
        #[test]
        fn any_value_survives_a_rewrite(value in "[ -~\t\n]{0,40}") {
            let mut config = Config::new("config");
            config.set_str("section.sub.key", &value).unwrap();
            let reparsed = Config::parse(config.to_text().as_bytes(), Path::new("config")).unwrap();
            prop_assert_eq!(reparsed.get_str("section.sub.key").unwrap(), Some(value.as_str()));
        }
    }
}
