//! The per-request message snapshot the engine evaluates.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::EmailAddress;
use super::attachment::AttachmentMeta;
use super::keyword::Keywords;
use crate::parser::header::parse_date;

/// Opaque message identifier. Ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// Opaque mailbox identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailboxId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl MailboxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for MailboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded body parts, only read when projecting messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    /// Plain-text body (from the `text/plain` part).
    pub text: Option<String>,
    /// HTML body (from the `text/html` part).
    pub html: Option<String>,
}

/// Immutable snapshot of one message's queryable attributes.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub id: MessageId,
    pub thread_id: String,
    pub blob_id: String,
    /// Every mailbox holding the message, visible or not.
    pub mailbox_ids: BTreeSet<MailboxId>,
    pub keywords: Keywords,
    /// Decoded header fields in message order, names as written.
    pub headers: Vec<(String, String)>,
    /// Size of the raw message in bytes.
    pub size: u64,
    /// Internal (delivery) date, used when the `Date` header is absent or unparseable.
    pub received_at: DateTime<Utc>,
    pub attachments: Vec<AttachmentMeta>,
    pub body: MessageBody,
}

impl MessageView {
    /// First value of a header, name compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, in message order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn subject(&self) -> &str {
        self.header("subject").unwrap_or("")
    }

    /// Parsed addresses of an address header (`from`, `to`, `cc`, `bcc`, `reply-to`).
    pub fn addresses(&self, name: &str) -> Vec<EmailAddress> {
        self.header_values(name)
            .flat_map(EmailAddress::parse_list)
            .collect()
    }

    /// The `Date` header when parseable, else the received date.
    pub fn sent_at(&self) -> DateTime<Utc> {
        self.header("date")
            .and_then(parse_date)
            .unwrap_or(self.received_at)
    }

    /// Whether at least one attachment is a regular (non-inline) part.
    pub fn has_attachment(&self) -> bool {
        self.attachments.iter().any(|a| !a.is_inline)
    }
}
