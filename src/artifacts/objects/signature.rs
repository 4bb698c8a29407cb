//! Author, committer and tagger identities
//!
//! A signature is stored as `Name <email> <unix-seconds> <+HHMM>`. Name and
//! email are byte strings; no text encoding is assumed.

use crate::errors::{Error, Result};
use chrono::{FixedOffset, TimeZone};

/// Timestamps are written without sign padding or leading zeros
const TIME_REGEX: &str = r"^(0|-?[1-9][0-9]*)$";
/// `+HHMM` or `-HHMM`; minutes never exceed 59
const OFFSET_REGEX: &str = r"^([+-])([0-9]{2})([0-5][0-9])$";
/// Largest offset that fits `HHMM`
const MAX_OFFSET_MINUTES: i16 = 99 * 60 + 59;

/// Identity plus a timestamp with its UTC offset
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Signature {
    name: Vec<u8>,
    email: Vec<u8>,
    /// Seconds since the Unix epoch
    time: i64,
    /// Minutes east of UTC
    offset: i16,
}

impl Signature {
    pub fn new(
        name: impl Into<Vec<u8>>,
        email: impl Into<Vec<u8>>,
        time: i64,
        offset: i16,
    ) -> Result<Self> {
        let name = name.into();
        let email = email.into();

        for field in [&name, &email] {
            if field.iter().any(|b| matches!(b, b'<' | b'>' | b'\n' | 0)) {
                return Err(Error::invalid_spec(format!(
                    "invalid character in signature field {:?}",
                    String::from_utf8_lossy(field)
                )));
            }
        }

        if offset.unsigned_abs() > MAX_OFFSET_MINUTES as u16 {
            return Err(Error::invalid_spec(format!(
                "timezone offset of {offset} minutes is out of range"
            )));
        }

        Ok(Signature {
            name,
            email,
            time,
            offset,
        })
    }

    /// Create a signature stamped with the current local time
    pub fn now(name: impl Into<Vec<u8>>, email: impl Into<Vec<u8>>) -> Result<Self> {
        let now = chrono::Local::now();
        let offset = (now.offset().local_minus_utc() / 60) as i16;
        Self::new(name, email, now.timestamp(), offset)
    }

    /// Load an identity from `GIT_<ROLE>_NAME` / `GIT_<ROLE>_EMAIL`
    ///
    /// `role` is `AUTHOR` or `COMMITTER`. Returns `None` when either variable
    /// is unset.
    pub fn load_from_env(role: &str) -> Result<Option<Self>> {
        let name = std::env::var(format!("GIT_{role}_NAME")).ok();
        let email = std::env::var(format!("GIT_{role}_EMAIL")).ok();

        match (name, email) {
            (Some(name), Some(email)) => Self::now(name, email).map(Some),
            _ => Ok(None),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn email(&self) -> &[u8] {
        &self.email
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn offset(&self) -> i16 {
        self.offset
    }

    /// Format name and email for display: `Name <email@example.com>`
    pub fn display_name(&self) -> String {
        format!(
            "{} <{}>",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.email)
        )
    }

    /// Timestamp as a chrono date-time in the signature's own offset
    pub fn timestamp(&self) -> Option<chrono::DateTime<FixedOffset>> {
        FixedOffset::east_opt(self.offset as i32 * 60)?
            .timestamp_opt(self.time, 0)
            .single()
    }

    /// Format timestamp in human-readable form: `Mon Jan 1 12:34:56 2024 +0000`
    pub fn readable_timestamp(&self) -> Option<String> {
        self.timestamp()
            .map(|ts| ts.format("%a %b %-d %H:%M:%S %Y %z").to_string())
    }

    fn format_offset(&self) -> String {
        let sign = if self.offset < 0 { '-' } else { '+' };
        let minutes = self.offset.unsigned_abs();
        format!("{sign}{:02}{:02}", minutes / 60, minutes % 60)
    }

    /// Canonical encoding used in commit, tag and reflog records
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + self.email.len() + 24);
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(format!("{} {}", self.time, self.format_offset()).as_bytes());
        out
    }

    /// Parse `Name <email> <seconds> <+HHMM>`
    pub fn parse(value: &[u8]) -> Result<Self> {
        let invalid = |reason: &str| Error::corrupt("signature", reason.to_string());

        let email_start = value
            .iter()
            .position(|&b| b == b'<')
            .ok_or_else(|| invalid("missing '<'"))?;
        let email_end = value
            .iter()
            .rposition(|&b| b == b'>')
            .filter(|&end| end > email_start)
            .ok_or_else(|| invalid("missing '>'"))?;

        let name = value[..email_start]
            .strip_suffix(b" ")
            .ok_or_else(|| invalid("missing space before '<'"))?;
        let email = &value[email_start + 1..email_end];

        let rest = value[email_end + 1..]
            .strip_prefix(b" ")
            .ok_or_else(|| invalid("missing timestamp"))?;
        let rest = std::str::from_utf8(rest).map_err(|_| invalid("non-ascii timestamp"))?;
        let (time, offset) = rest
            .split_once(' ')
            .ok_or_else(|| invalid("missing timezone"))?;

        let time_pattern = regex::Regex::new(TIME_REGEX)
            .map_err(|e| invalid(format!("invalid timestamp pattern: {e}").as_str()))?;
        if !time_pattern.is_match(time) {
            return Err(invalid("invalid timestamp"));
        }
        let time = time
            .parse::<i64>()
            .map_err(|_| invalid("invalid timestamp"))?;
        let offset = parse_offset(offset)?.ok_or_else(|| invalid("invalid timezone"))?;

        Ok(Signature {
            name: name.to_vec(),
            email: email.to_vec(),
            time,
            offset,
        })
    }
}

/// Minutes east of UTC, or `None` for anything the encoder would not write
///
/// `-0000` is refused: it would read back as `+0000`.
fn parse_offset(value: &str) -> Result<Option<i16>> {
    let pattern = regex::Regex::new(OFFSET_REGEX)
        .map_err(|e| Error::corrupt("signature", format!("invalid timezone pattern: {e}")))?;
    let Some(captures) = pattern.captures(value) else {
        return Ok(None);
    };

    let hours: i16 = captures[2].parse().unwrap_or_default();
    let minutes: i16 = captures[3].parse().unwrap_or_default();
    let total = hours * 60 + minutes;

    Ok(match &captures[1] {
        "+" => Some(total),
        "-" if total != 0 => Some(-total),
        _ => None,
    })
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.encode()))
    }
}
