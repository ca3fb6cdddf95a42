//! JSON account snapshots.
//!
//! ```json
//! {
//!   "principal": "alice",
//!   "mailboxes": [{"id": "inbox", "name": "INBOX", "readable": true}],
//!   "messages": [{
//!     "id": "m1", "mailboxIds": ["inbox"], "keywords": ["$Seen"],
//!     "receivedAt": "2024-01-01T10:00:00Z",
//!     "eml": "m1.eml"
//!   }]
//! }
//! ```
//!
//! A message either points at an `.eml` file (relative to the snapshot) or
//! carries inline `headers`, `textBody`, `htmlBody` and `attachments`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::memory::{MailboxEntry, MemoryStore};
use crate::error::{QueryError, Result};
use crate::model::attachment::AttachmentMeta;
use crate::model::keyword::Keywords;
use crate::model::{MailboxId, MessageBody, MessageId, MessageView};
use crate::parser::eml::load_eml;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    principal: String,
    #[serde(default)]
    mailboxes: Vec<SnapshotMailbox>,
    #[serde(default)]
    messages: Vec<SnapshotMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMailbox {
    id: MailboxId,
    #[serde(default)]
    name: String,
    #[serde(default = "default_true")]
    readable: bool,
    #[serde(default)]
    shared_with: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotAttachment {
    #[serde(flatten)]
    meta: AttachmentMeta,
    /// Extracted text content, fed to the text index.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMessage {
    id: MessageId,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    blob_id: Option<String>,
    mailbox_ids: BTreeSet<MailboxId>,
    #[serde(default)]
    keywords: Keywords,
    received_at: DateTime<Utc>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    eml: Option<PathBuf>,
    #[serde(default)]
    headers: BTreeMap<String, HeaderValue>,
    #[serde(default)]
    text_body: Option<String>,
    #[serde(default)]
    html_body: Option<String>,
    #[serde(default)]
    attachments: Vec<SnapshotAttachment>,
}

/// Load a snapshot file into a [`MemoryStore`] owned by the snapshot's principal.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<MemoryStore> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| QueryError::io(path, e))?;
    let file: SnapshotFile = serde_json::from_str(&contents).map_err(|e| QueryError::Snapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut store = MemoryStore::new(file.principal);
    for mailbox in file.mailboxes {
        store.add_mailbox(MailboxEntry {
            id: mailbox.id,
            name: mailbox.name,
            readable: mailbox.readable,
            shared_with: mailbox.shared_with,
        });
    }

    let mut seen = BTreeSet::new();
    for message in file.messages {
        if !seen.insert(message.id.clone()) {
            return Err(QueryError::Snapshot {
                path: path.to_path_buf(),
                reason: format!("duplicate message id '{}'", message.id),
            });
        }
        let (view, attachment_text) = build_view(message, base)?;
        debug!(id = %view.id, mailboxes = view.mailbox_ids.len(), "Loaded message");
        store.add_message(view, &attachment_text)?;
    }

    info!(
        path = %path.display(),
        mailboxes = store.mailboxes().len(),
        messages = store.len(),
        "Loaded snapshot"
    );
    Ok(store)
}

fn build_view(message: SnapshotMessage, base: &Path) -> Result<(MessageView, Vec<String>)> {
    let id = message.id;
    let mut attachment_text = Vec::new();

    let (headers, body, attachments, parsed_size) = match &message.eml {
        Some(eml) => {
            let parsed = load_eml(base.join(eml))?;
            attachment_text = parsed.attachment_text;
            (parsed.headers, parsed.body, parsed.attachments, parsed.size)
        }
        None => {
            let headers: Vec<(String, String)> = message
                .headers
                .into_iter()
                .flat_map(|(name, value)| {
                    let values = match value {
                        HeaderValue::One(v) => vec![v],
                        HeaderValue::Many(vs) => vs,
                    };
                    values.into_iter().map(move |v| (name.clone(), v))
                })
                .collect();
            let body = MessageBody {
                text: message.text_body,
                html: message.html_body,
            };
            let attachments: Vec<AttachmentMeta> = message
                .attachments
                .into_iter()
                .map(|a| {
                    attachment_text.extend(a.text);
                    a.meta
                })
                .collect();
            let size = inline_size(&headers, &body, &attachments);
            (headers, body, attachments, size)
        }
    };

    let view = MessageView {
        thread_id: message.thread_id.unwrap_or_else(|| id.to_string()),
        blob_id: message.blob_id.unwrap_or_else(|| id.to_string()),
        id,
        mailbox_ids: message.mailbox_ids,
        keywords: message.keywords,
        headers,
        size: message.size.unwrap_or(parsed_size),
        received_at: message.received_at,
        attachments,
        body,
    };
    Ok((view, attachment_text))
}

/// Approximate raw size of an inline message.
fn inline_size(headers: &[(String, String)], body: &MessageBody, attachments: &[AttachmentMeta]) -> u64 {
    let header_bytes: usize = headers.iter().map(|(k, v)| k.len() + v.len() + 4).sum();
    let body_bytes = body.text.as_ref().map_or(0, String::len) + body.html.as_ref().map_or(0, String::len);
    let attachment_bytes: u64 = attachments.iter().map(|a| a.size).sum();
    (header_bytes + body_bytes) as u64 + attachment_bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fulltext::{TextIndex, TextScope};
    use crate::search::visibility::VisibleMailboxes;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_inline_and_eml_messages() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "m2.eml",
            "From: Carol <carol@example.org>\nSubject: From disk\nDate: Tue, 25 Jul 2017 08:36:11 +0200\n\nDisk body\n",
        );
        let snapshot = write(
            dir.path(),
            "snapshot.json",
            r#"{
                "principal": "alice",
                "mailboxes": [{"id": "inbox", "name": "INBOX"}, {"id": "locked", "readable": false}],
                "messages": [
                    {
                        "id": "m1", "mailboxIds": ["inbox"], "keywords": ["$Seen"],
                        "receivedAt": "2024-01-01T10:00:00Z",
                        "headers": {"Subject": "Inline", "To": ["a@x.org", "b@x.org"]},
                        "textBody": "inline body",
                        "attachments": [{"filename": "r.pdf", "size": 10, "text": "revenue"}]
                    },
                    {"id": "m2", "mailboxIds": ["inbox", "locked"], "receivedAt": "2024-01-02T10:00:00Z", "eml": "m2.eml", "size": 4242}
                ]
            }"#,
        );

        let store = load_snapshot(&snapshot).unwrap();
        assert_eq!(store.owner(), "alice");
        assert_eq!(store.len(), 2);
        assert_eq!(store.visible_mailboxes("alice").unwrap().len(), 1);

        let m1 = store.message(&MessageId::new("m1")).unwrap();
        assert_eq!(m1.subject(), "Inline");
        assert_eq!(m1.header_values("to").count(), 2);
        assert!(m1.keywords.contains("$seen"));
        assert!(m1.has_attachment());
        assert_eq!(m1.thread_id, "m1");
        assert!(store
            .matches(TextScope::Attachments, "REVENUE", &m1.id)
            .unwrap());

        let m2 = store.message(&MessageId::new("m2")).unwrap();
        assert_eq!(m2.subject(), "From disk");
        assert_eq!(m2.size, 4242);
        assert!(store.matches(TextScope::Body, "disk body", &m2.id).unwrap());
    }

    #[test]
    fn test_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.json", r#"{"mailboxes": []}"#);
        assert!(matches!(load_snapshot(&bad), Err(QueryError::Snapshot { .. })));

        let bad_keyword = write(
            dir.path(),
            "kw.json",
            r#"{"principal": "a", "messages": [{"id": "m", "mailboxIds": [], "keywords": ["a b"], "receivedAt": "2024-01-01T00:00:00Z"}]}"#,
        );
        assert!(load_snapshot(&bad_keyword).is_err());
    }

    #[test]
    fn test_duplicate_ids_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let dup = write(
            dir.path(),
            "dup.json",
            r#"{"principal": "a", "messages": [
                {"id": "m", "mailboxIds": ["x"], "receivedAt": "2024-01-01T00:00:00Z"},
                {"id": "m", "mailboxIds": ["x"], "receivedAt": "2024-01-01T00:00:00Z"}
            ]}"#,
        );
        assert!(matches!(load_snapshot(&dup), Err(QueryError::Snapshot { .. })));

        let missing = write(
            dir.path(),
            "missing.json",
            r#"{"principal": "a", "messages": [{"id": "m", "mailboxIds": ["x"], "receivedAt": "2024-01-01T00:00:00Z", "eml": "nope.eml"}]}"#,
        );
        assert!(matches!(load_snapshot(&missing), Err(QueryError::Io { .. })));
        assert!(matches!(load_snapshot(dir.path().join("absent.json")), Err(QueryError::Io { .. })));
    }
}
