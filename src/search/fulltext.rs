//! Full-text oracle: the engine asks "does message M contain term T?" and never tokenizes itself.
//!
//! [`MemoryTextIndex`] is a lowercase substring implementation suitable for
//! snapshots and tests; production deployments plug in a real search backend.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::model::{MessageId, MessageView};
use crate::parser::mime::html_to_text;

/// Which part of a message a text lookup covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextScope {
    /// Address headers, subject, body, attachment content and attachment filenames.
    All,
    /// Body parts only.
    Body,
    /// Attachment content only.
    Attachments,
}

/// External text-search oracle.
///
/// Implementations report an unreachable backend as an error
/// ([`crate::error::QueryError::SearchUnavailable`]), never as `false`.
pub trait TextIndex: Send + Sync {
    fn matches(&self, scope: TextScope, term: &str, message: &MessageId) -> Result<bool>;
}

#[derive(Debug, Clone, Default)]
struct IndexedText {
    headers: String,
    body: String,
    attachments: String,
    filenames: String,
}

/// In-memory text index over lowercase message text.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextIndex {
    documents: HashMap<MessageId, IndexedText>,
}

impl MemoryTextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a message together with the extracted text of its attachments.
    pub fn add(&mut self, view: &MessageView, attachment_text: &[String]) {
        let headers = ["from", "to", "cc", "bcc", "subject"]
            .iter()
            .flat_map(|&name| view.header_values(name))
            .collect::<Vec<_>>()
            .join("\n");

        let body = match (&view.body.text, &view.body.html) {
            (Some(text), _) => text.clone(),
            (None, Some(html)) => html_to_text(html),
            (None, None) => String::new(),
        };

        let filenames = view
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        self.documents.insert(
            view.id.clone(),
            IndexedText {
                headers: headers.to_lowercase(),
                body: body.to_lowercase(),
                attachments: attachment_text.join("\n").to_lowercase(),
                filenames: filenames.to_lowercase(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl TextIndex for MemoryTextIndex {
    fn matches(&self, scope: TextScope, term: &str, message: &MessageId) -> Result<bool> {
        let Some(doc) = self.documents.get(message) else {
            debug!(message = %message, "Message not in text index");
            return Ok(false);
        };

        let needle = term.to_lowercase();
        let found = match scope {
            TextScope::All => [&doc.headers, &doc.body, &doc.attachments, &doc.filenames]
                .iter()
                .any(|field| field.contains(&needle)),
            TextScope::Body => doc.body.contains(&needle),
            TextScope::Attachments => doc.attachments.contains(&needle),
        };
        Ok(found)
    }
}
