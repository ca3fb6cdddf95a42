//! Leaf predicates of the filter language and their evaluation against one candidate.
//!
//! Each JSON filter-condition property decodes into one [`Predicate`]. Decoding is
//! strict: wrong types, negative sizes, bad dates and invalid keyword names are
//! rejected as invalid arguments before any message is looked at.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::fulltext::{TextIndex, TextScope};
use super::visibility::Candidate;
use crate::error::{QueryError, Result};
use crate::model::keyword::{self, Keyword};
use crate::model::MailboxId;

/// Header fields addressable by name in a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    From,
    To,
    Cc,
    Bcc,
    Subject,
}

impl HeaderField {
    pub fn header_name(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
            Self::Subject => "subject",
        }
    }
}

/// Boolean message states backed by system keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFlag {
    /// Negation of `$Seen`.
    Unread,
    Flagged,
    Answered,
    Draft,
    Forwarded,
}

impl StateFlag {
    fn is_set(self, candidate: &Candidate) -> bool {
        let keywords = &candidate.view.keywords;
        match self {
            Self::Unread => !keywords.contains(keyword::SEEN),
            Self::Flagged => keywords.contains(keyword::FLAGGED),
            Self::Answered => keywords.contains(keyword::ANSWERED),
            Self::Draft => keywords.contains(keyword::DRAFT),
            Self::Forwarded => keywords.contains(keyword::FORWARDED),
        }
    }
}

/// One leaf condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    MailboxIn(BTreeSet<MailboxId>),
    MailboxNotIn(BTreeSet<MailboxId>),
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
    MinSize(u64),
    MaxSize(u64),
    State(StateFlag, bool),
    HasAttachment(bool),
    /// Full-text search across headers, body and attachments (oracle).
    Text(String),
    /// Body-only text search (oracle).
    Body(String),
    /// Attachment-content text search (oracle).
    AttachmentText(String),
    HeaderField(HeaderField, String),
    /// Substring of attachment filenames only.
    AttachmentFileName(String),
    Header { name: String, value: String },
    HasKeyword(Keyword),
    NotKeyword(Keyword),
}

impl Predicate {
    /// Decode one filter-condition property.
    pub fn from_property(name: &str, value: &Value) -> Result<Self> {
        let predicate = match name {
            "inMailboxes" => Self::MailboxIn(mailbox_ids(name, value)?),
            "notInMailboxes" => Self::MailboxNotIn(mailbox_ids(name, value)?),
            "before" => Self::Before(utc_date(name, value)?),
            "after" => Self::After(utc_date(name, value)?),
            "minSize" => Self::MinSize(size(name, value)?),
            "maxSize" => Self::MaxSize(size(name, value)?),
            "isUnread" => Self::State(StateFlag::Unread, boolean(name, value)?),
            "isFlagged" => Self::State(StateFlag::Flagged, boolean(name, value)?),
            "isAnswered" => Self::State(StateFlag::Answered, boolean(name, value)?),
            "isDraft" => Self::State(StateFlag::Draft, boolean(name, value)?),
            "isForwarded" => Self::State(StateFlag::Forwarded, boolean(name, value)?),
            "hasAttachment" => Self::HasAttachment(boolean(name, value)?),
            "text" => Self::Text(string(name, value)?),
            "body" => Self::Body(string(name, value)?),
            "attachments" => Self::AttachmentText(string(name, value)?),
            "from" => Self::HeaderField(HeaderField::From, string(name, value)?),
            "to" => Self::HeaderField(HeaderField::To, string(name, value)?),
            "cc" => Self::HeaderField(HeaderField::Cc, string(name, value)?),
            "bcc" => Self::HeaderField(HeaderField::Bcc, string(name, value)?),
            "subject" => Self::HeaderField(HeaderField::Subject, string(name, value)?),
            "attachmentFileName" => Self::AttachmentFileName(string(name, value)?),
            "header" => header(value)?,
            "hasKeyword" => Self::HasKeyword(Keyword::parse(&string(name, value)?)?),
            "notKeyword" => Self::NotKeyword(Keyword::parse(&string(name, value)?)?),
            other => {
                return Err(QueryError::invalid(format!(
                    "Unknown filter condition property '{other}'"
                )))
            }
        };
        Ok(predicate)
    }

    /// Whether evaluation needs the text-search oracle.
    pub fn needs_oracle(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Body(_) | Self::AttachmentText(_))
    }
}

/// Evaluate one predicate against one candidate.
///
/// Only the text predicates touch `oracle`; its failures abort the query.
pub fn matches(predicate: &Predicate, candidate: &Candidate, oracle: &dyn TextIndex) -> Result<bool> {
    let view = &candidate.view;
    let result = match predicate {
        Predicate::MailboxIn(ids) => !candidate.mailboxes.is_disjoint(ids),
        Predicate::MailboxNotIn(ids) => candidate.mailboxes.is_disjoint(ids),
        Predicate::Before(bound) => view.sent_at() < *bound,
        Predicate::After(bound) => view.sent_at() > *bound,
        Predicate::MinSize(min) => view.size > *min,
        Predicate::MaxSize(max) => view.size < *max,
        Predicate::State(flag, wanted) => flag.is_set(candidate) == *wanted,
        Predicate::HasAttachment(wanted) => view.has_attachment() == *wanted,
        Predicate::Text(term) => oracle.matches(TextScope::All, term, &view.id)?,
        Predicate::Body(term) => oracle.matches(TextScope::Body, term, &view.id)?,
        Predicate::AttachmentText(term) => oracle.matches(TextScope::Attachments, term, &view.id)?,
        Predicate::HeaderField(field, value) => view
            .header_values(field.header_name())
            .any(|header| contains_ignore_case(header, value)),
        Predicate::AttachmentFileName(term) => view
            .attachments
            .iter()
            .any(|a| contains_ignore_case(&a.filename, term)),
        Predicate::Header { name, value } => view
            .header_values(name)
            .any(|header| value.is_empty() || contains_ignore_case(header, value)),
        // $Deleted and $Recent are deliberately unconstrained, see NON_QUERYABLE_KEYWORDS.
        Predicate::HasKeyword(k) => k.is_non_queryable() || view.keywords.has(k),
        Predicate::NotKeyword(k) => k.is_non_queryable() || !view.keywords.has(k),
    };
    Ok(result)
}

/// Case-insensitive substring test. An empty needle matches any non-empty haystack.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return !haystack.is_empty();
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ── Value decoding ──────────────────────────────────────────────

fn type_error(name: &str, expected: &str) -> QueryError {
    QueryError::invalid(format!("'{name}' must be {expected}"))
}

fn boolean(name: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| type_error(name, "a boolean"))
}

fn string(name: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| type_error(name, "a string"))
}

fn size(name: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| type_error(name, "a non-negative integer"))
}

fn utc_date(name: &str, value: &Value) -> Result<DateTime<Utc>> {
    let raw = value
        .as_str()
        .ok_or_else(|| type_error(name, "a UTC date string"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| type_error(name, "a UTC date string (RFC 3339)"))
}

fn mailbox_ids(name: &str, value: &Value) -> Result<BTreeSet<MailboxId>> {
    let items = value
        .as_array()
        .ok_or_else(|| type_error(name, "a list of mailbox ids"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(MailboxId::new)
                .ok_or_else(|| type_error(name, "a list of mailbox ids"))
        })
        .collect()
}

fn header(value: &Value) -> Result<Predicate> {
    let arity_error = || QueryError::invalid("'header' must be a list of exactly 2 strings [name, value]");
    match value.as_array().map(Vec::as_slice) {
        Some([Value::String(name), Value::String(value)]) => Ok(Predicate::Header {
            name: name.clone(),
            value: value.clone(),
        }),
        _ => Err(arity_error()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::AttachmentMeta;
    use crate::model::keyword::Keywords;
    use crate::model::message::tests::make_view;
    use serde_json::json;

    struct NoIndex;

    impl TextIndex for NoIndex {
        fn matches(&self, _: TextScope, _: &str, _: &crate::model::MessageId) -> Result<bool> {
            Err(QueryError::SearchUnavailable("no index".into()))
        }
    }

    fn candidate(keywords: &[&str]) -> Candidate {
        let mut view = make_view("m1", &["inbox"]);
        view.keywords = Keywords::from_names(keywords).unwrap();
        Candidate {
            mailboxes: view.mailbox_ids.clone(),
            view,
        }
    }

    fn eval(name: &str, value: Value, c: &Candidate) -> bool {
        let p = Predicate::from_property(name, &value).unwrap();
        matches(&p, c, &NoIndex).unwrap()
    }

    #[test]
    fn test_state_flags() {
        let seen_flagged = candidate(&["$Seen", "$Flagged"]);
        assert!(eval("isFlagged", json!(true), &seen_flagged));
        assert!(!eval("isUnread", json!(true), &seen_flagged));
        assert!(eval("isUnread", json!(false), &seen_flagged));

        let fresh = candidate(&[]);
        assert!(eval("isUnread", json!(true), &fresh));
        assert!(eval("isAnswered", json!(false), &fresh));
        assert!(!eval("isForwarded", json!(true), &fresh));
    }

    #[test]
    fn test_non_boolean_flag_is_invalid() {
        let err = Predicate::from_property("isFlagged", &json!("yes")).unwrap_err();
        assert_eq!(err.kind(), "invalidArguments");
    }

    #[test]
    fn test_reserved_keywords_always_match() {
        let c = candidate(&["$Deleted"]);
        assert!(eval("hasKeyword", json!("$Deleted"), &c));
        assert!(eval("notKeyword", json!("$Deleted"), &c));
        assert!(eval("hasKeyword", json!("$Recent"), &c));
        assert!(eval("notKeyword", json!("$recent"), &candidate(&["$Recent"])));
    }

    #[test]
    fn test_keyword_presence() {
        let c = candidate(&["Work"]);
        assert!(eval("hasKeyword", json!("work"), &c));
        assert!(!eval("notKeyword", json!("work"), &c));
        assert!(eval("notKeyword", json!("personal"), &c));
    }

    #[test]
    fn test_invalid_keyword_rejected() {
        assert!(Predicate::from_property("hasKeyword", &json!("bad keyword")).is_err());
    }

    #[test]
    fn test_header_field_substring() {
        let c = candidate(&[]);
        assert!(eval("from", json!("ALICE@"), &c));
        assert!(eval("to", json!("bob"), &c));
        assert!(!eval("cc", json!("bob"), &c));
        // Empty value matches any present, non-empty header
        assert!(eval("subject", json!(""), &c));
        assert!(!eval("bcc", json!(""), &c));
    }

    #[test]
    fn test_header_arity() {
        assert!(Predicate::from_property("header", &json!(["Subject"])).is_err());
        assert!(Predicate::from_property("header", &json!(["a", "b", "c"])).is_err());
        assert!(Predicate::from_property("header", &json!(["a", 1])).is_err());
        let c = candidate(&[]);
        assert!(eval("header", json!(["subject", "MESSAGE"]), &c));
        assert!(!eval("header", json!(["X-Missing", ""]), &c));
    }

    #[test]
    fn test_attachment_filename_and_has_attachment() {
        let mut c = candidate(&[]);
        assert!(eval("hasAttachment", json!(false), &c));
        c.view.attachments.push(AttachmentMeta {
            filename: "matchme.txt".into(),
            content_type: "text/plain".into(),
            size: 3,
            is_inline: false,
        });
        assert!(eval("hasAttachment", json!(true), &c));
        assert!(eval("attachmentFileName", json!("MatchMe"), &c));
        assert!(!eval("attachmentFileName", json!("other"), &c));
    }

    #[test]
    fn test_sizes_are_strict_bounds() {
        let c = candidate(&[]);
        assert!(eval("minSize", json!(999), &c));
        assert!(!eval("minSize", json!(1000), &c));
        assert!(eval("maxSize", json!(1001), &c));
        assert!(!eval("maxSize", json!(1000), &c));
        assert!(Predicate::from_property("minSize", &json!(-1)).is_err());
    }

    #[test]
    fn test_dates_use_received_fallback() {
        let c = candidate(&[]);
        // received_at is 2024-01-01T10:00:00Z
        assert!(eval("after", json!("2023-12-31T00:00:00Z"), &c));
        assert!(eval("before", json!("2024-01-01T10:00:01Z"), &c));
        assert!(!eval("before", json!("2024-01-01T10:00:00Z"), &c));
        assert!(Predicate::from_property("before", &json!("yesterday")).is_err());
    }

    #[test]
    fn test_mailbox_membership() {
        let c = candidate(&[]);
        assert!(eval("inMailboxes", json!(["inbox", "other"]), &c));
        assert!(!eval("notInMailboxes", json!(["inbox"]), &c));
        assert!(eval("notInMailboxes", json!(["never-existed"]), &c));
        assert!(Predicate::from_property("inMailboxes", &json!("inbox")).is_err());
    }

    #[test]
    fn test_oracle_failure_is_an_error() {
        let c = candidate(&[]);
        let p = Predicate::from_property("text", &json!("anything")).unwrap();
        assert!(p.needs_oracle());
        let err = matches(&p, &c, &NoIndex).unwrap_err();
        assert!(err.is_collaborator_failure());
    }

    #[test]
    fn test_unknown_property() {
        let err = Predicate::from_property("isImportant", &json!(true)).unwrap_err();
        assert!(err.to_string().contains("isImportant"));
    }
}
