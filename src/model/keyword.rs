//! Message keywords (IMAP flags as JMAP markers).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

pub const SEEN: &str = "$Seen";
pub const FLAGGED: &str = "$Flagged";
pub const ANSWERED: &str = "$Answered";
pub const DRAFT: &str = "$Draft";
pub const FORWARDED: &str = "$Forwarded";
pub const DELETED: &str = "$Deleted";
pub const RECENT: &str = "$Recent";

/// Session-transient markers that keyword predicates never look at.
///
/// Intentional: `hasKeyword`/`notKeyword` naming one of these is always satisfied.
pub const NON_QUERYABLE_KEYWORDS: [&str; 2] = [DELETED, RECENT];

const MAX_KEYWORD_LEN: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['(', ')', '{', ']', '%', '*', '"', '\\'];

/// A validated keyword name. Comparison is ASCII case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Keyword(String);

impl Keyword {
    /// Validate a keyword name: 1 to 255 visible ASCII characters, no IMAP specials.
    pub fn parse(name: &str) -> Result<Self> {
        let valid = !name.is_empty()
            && name.len() <= MAX_KEYWORD_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_graphic() && !FORBIDDEN_CHARS.contains(&c));
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(QueryError::invalid(format!("Invalid keyword: '{name}'")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is `$Deleted` or `$Recent`.
    pub fn is_non_queryable(&self) -> bool {
        NON_QUERYABLE_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&self.0))
    }

    fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Keyword {}

impl PartialOrd for Keyword {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Keyword {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl TryFrom<String> for Keyword {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Keyword> for String {
    fn from(value: Keyword) -> Self {
        value.0
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of keywords attached to one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keywords(BTreeSet<Keyword>);

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw names, rejecting invalid ones.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| Keyword::parse(n.as_ref()))
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// Case-insensitive membership test by name.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|k| k.as_str().eq_ignore_ascii_case(name))
    }

    pub fn has(&self, keyword: &Keyword) -> bool {
        self.0.contains(keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_case_insensitive_equality() {
        let a = Keyword::parse("$Flagged").unwrap();
        let b = Keyword::parse("$FLAGGED").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_keyword_rejects_forbidden_chars() {
        assert!(Keyword::parse("").is_err());
        assert!(Keyword::parse("with space").is_err());
        assert!(Keyword::parse("back\\slash").is_err());
        assert!(Keyword::parse("paren(").is_err());
        assert!(Keyword::parse(&"a".repeat(256)).is_err());
        assert!(Keyword::parse("$custom_label").is_ok());
    }

    #[test]
    fn test_non_queryable() {
        assert!(Keyword::parse("$Deleted").unwrap().is_non_queryable());
        assert!(Keyword::parse("$recent").unwrap().is_non_queryable());
        assert!(!Keyword::parse("$Seen").unwrap().is_non_queryable());
    }

    #[test]
    fn test_keywords_contains() {
        let kw = Keywords::from_names(["$Seen", "work"]).unwrap();
        assert!(kw.contains("$seen"));
        assert!(kw.contains("WORK"));
        assert!(!kw.contains("$Flagged"));
    }

    #[test]
    fn test_keywords_deserialize_validates() {
        let ok: std::result::Result<Keywords, _> = serde_json::from_str(r#"["$Seen","$Flagged"]"#);
        assert!(ok.is_ok());
        let bad: std::result::Result<Keywords, _> = serde_json::from_str(r#"["bad keyword"]"#);
        assert!(bad.is_err());
    }
}
