//! Message projections for `fetchMessages`.

use std::collections::BTreeSet;

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use super::visibility::Candidate;
use crate::error::{QueryError, Result};
use crate::model::address::EmailAddress;
use crate::model::keyword;
use crate::parser::mime::html_to_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageProperty {
    Id,
    BlobId,
    ThreadId,
    MailboxIds,
    InReplyToMessageId,
    IsUnread,
    IsFlagged,
    IsAnswered,
    IsDraft,
    IsForwarded,
    HasAttachment,
    Keywords,
    Headers,
    From,
    To,
    Cc,
    Bcc,
    ReplyTo,
    Subject,
    Date,
    Size,
    Preview,
    TextBody,
    HtmlBody,
    Attachments,
}

impl MessageProperty {
    pub const ALL: [Self; 25] = [
        Self::Id,
        Self::BlobId,
        Self::ThreadId,
        Self::MailboxIds,
        Self::InReplyToMessageId,
        Self::IsUnread,
        Self::IsFlagged,
        Self::IsAnswered,
        Self::IsDraft,
        Self::IsForwarded,
        Self::HasAttachment,
        Self::Keywords,
        Self::Headers,
        Self::From,
        Self::To,
        Self::Cc,
        Self::Bcc,
        Self::ReplyTo,
        Self::Subject,
        Self::Date,
        Self::Size,
        Self::Preview,
        Self::TextBody,
        Self::HtmlBody,
        Self::Attachments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::BlobId => "blobId",
            Self::ThreadId => "threadId",
            Self::MailboxIds => "mailboxIds",
            Self::InReplyToMessageId => "inReplyToMessageId",
            Self::IsUnread => "isUnread",
            Self::IsFlagged => "isFlagged",
            Self::IsAnswered => "isAnswered",
            Self::IsDraft => "isDraft",
            Self::IsForwarded => "isForwarded",
            Self::HasAttachment => "hasAttachment",
            Self::Keywords => "keywords",
            Self::Headers => "headers",
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
            Self::ReplyTo => "replyTo",
            Self::Subject => "subject",
            Self::Date => "date",
            Self::Size => "size",
            Self::Preview => "preview",
            Self::TextBody => "textBody",
            Self::HtmlBody => "htmlBody",
            Self::Attachments => "attachments",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        if raw == "body" {
            return Some(Self::TextBody);
        }
        Self::ALL.into_iter().find(|p| p.name() == raw)
    }
}

/// The properties a projection carries. `id` is always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySelection {
    properties: BTreeSet<MessageProperty>,
    /// Lowercased names requested through `headers.<Name>`.
    header_names: BTreeSet<String>,
}

impl Default for PropertySelection {
    fn default() -> Self {
        Self::all()
    }
}

impl PropertySelection {
    pub fn all() -> Self {
        Self {
            properties: MessageProperty::ALL.into_iter().collect(),
            header_names: BTreeSet::new(),
        }
    }

    /// Decode `fetchMessageProperties`: absent = every property, empty = only `id`.
    pub fn parse<S: AsRef<str>>(requested: Option<&[S]>) -> Result<Self> {
        let Some(requested) = requested else {
            return Ok(Self::all());
        };

        let mut selection = Self {
            properties: BTreeSet::from([MessageProperty::Id]),
            header_names: BTreeSet::new(),
        };
        for raw in requested {
            let raw = raw.as_ref();
            if let Some(header) = raw.strip_prefix("headers.") {
                if header.is_empty() {
                    return Err(QueryError::invalid(format!("Unknown property '{raw}'")));
                }
                selection.header_names.insert(header.to_ascii_lowercase());
                continue;
            }
            let property = MessageProperty::parse(raw)
                .ok_or_else(|| QueryError::invalid(format!("Unknown property '{raw}'")))?;
            selection.properties.insert(property);
        }
        Ok(selection)
    }

    pub fn contains(&self, property: MessageProperty) -> bool {
        self.properties.contains(&property)
    }

    /// Names as they appear in projections, `headers.<name>` entries last.
    pub fn names(&self) -> Vec<String> {
        self.properties
            .iter()
            .map(|p| p.name().to_string())
            .chain(self.header_names.iter().map(|h| format!("headers.{h}")))
            .collect()
    }

    fn wants_headers(&self) -> bool {
        self.contains(MessageProperty::Headers) || !self.header_names.is_empty()
    }
}

/// Build the projection of one candidate.
pub fn project(candidate: &Candidate, selection: &PropertySelection, preview_length: usize) -> Map<String, Value> {
    let mut out = Map::new();
    for &property in &selection.properties {
        if property == MessageProperty::Headers {
            continue;
        }
        out.insert(property.name().to_string(), property_value(candidate, property, preview_length));
    }
    if selection.wants_headers() {
        out.insert("headers".to_string(), headers_value(candidate, selection));
    }
    out
}

fn property_value(candidate: &Candidate, property: MessageProperty, preview_length: usize) -> Value {
    let view = &candidate.view;
    match property {
        MessageProperty::Id => json!(view.id),
        MessageProperty::BlobId => json!(view.blob_id),
        MessageProperty::ThreadId => json!(view.thread_id),
        MessageProperty::MailboxIds => json!(candidate.mailboxes),
        MessageProperty::InReplyToMessageId => view
            .header("in-reply-to")
            .map(|v| json!(v.trim().trim_start_matches('<').trim_end_matches('>')))
            .unwrap_or(Value::Null),
        MessageProperty::IsUnread => json!(!view.keywords.contains(keyword::SEEN)),
        MessageProperty::IsFlagged => json!(view.keywords.contains(keyword::FLAGGED)),
        MessageProperty::IsAnswered => json!(view.keywords.contains(keyword::ANSWERED)),
        MessageProperty::IsDraft => json!(view.keywords.contains(keyword::DRAFT)),
        MessageProperty::IsForwarded => json!(view.keywords.contains(keyword::FORWARDED)),
        MessageProperty::HasAttachment => json!(view.has_attachment()),
        MessageProperty::Keywords => Value::Object(
            view.keywords
                .iter()
                .map(|k| (k.to_string(), Value::Bool(true)))
                .collect(),
        ),
        MessageProperty::From => view
            .addresses("from")
            .into_iter()
            .next()
            .map(|a| json!(a))
            .unwrap_or(Value::Null),
        MessageProperty::To => addresses_value(view.addresses("to")),
        MessageProperty::Cc => addresses_value(view.addresses("cc")),
        MessageProperty::Bcc => addresses_value(view.addresses("bcc")),
        MessageProperty::ReplyTo => addresses_value(view.addresses("reply-to")),
        MessageProperty::Subject => json!(view.subject()),
        MessageProperty::Date => json!(view.sent_at().to_rfc3339_opts(SecondsFormat::Secs, true)),
        MessageProperty::Size => json!(view.size),
        MessageProperty::Preview => json!(preview(candidate, preview_length)),
        MessageProperty::TextBody => text_body(candidate).map(Value::String).unwrap_or(Value::Null),
        MessageProperty::HtmlBody => json!(view.body.html),
        MessageProperty::Attachments => Value::Array(
            view.attachments
                .iter()
                .map(|a| {
                    json!({
                        "name": a.filename,
                        "type": a.content_type,
                        "size": a.size,
                        "isInline": a.is_inline,
                    })
                })
                .collect(),
        ),
        MessageProperty::Headers => headers_value(candidate, &PropertySelection::all()),
    }
}

fn addresses_value(addresses: Vec<EmailAddress>) -> Value {
    json!(addresses)
}

fn headers_value(candidate: &Candidate, selection: &PropertySelection) -> Value {
    let all = selection.contains(MessageProperty::Headers);
    let mut map = Map::new();
    for (name, value) in &candidate.view.headers {
        if !all && !selection.header_names.contains(&name.to_ascii_lowercase()) {
            continue;
        }
        // First occurrence wins, as with single-valued JMAP header maps.
        if !map.keys().any(|k| k.eq_ignore_ascii_case(name)) {
            map.insert(name.clone(), Value::String(value.clone()));
        }
    }
    Value::Object(map)
}

/// Plain-text body, derived from the HTML body when there is no text part.
fn text_body(candidate: &Candidate) -> Option<String> {
    let body = &candidate.view.body;
    body.text
        .clone()
        .or_else(|| body.html.as_deref().map(html_to_text))
}

fn preview(candidate: &Candidate, length: usize) -> String {
    let text = text_body(candidate).unwrap_or_default();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(length).collect()
}
