//! In-memory store: mailboxes, message views and a text index for one account.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{QueryError, Result};
use crate::model::{MailboxId, MessageId, MessageView};
use crate::search::fulltext::{MemoryTextIndex, TextIndex, TextScope};
use crate::search::visibility::VisibleMailboxes;
use crate::store::MessageStore;

/// One mailbox of the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxEntry {
    pub id: MailboxId,
    pub name: String,
    /// Whether the owner may read it.
    pub readable: bool,
    /// Other principals the mailbox is delegated to.
    pub shared_with: Vec<String>,
}

impl MailboxEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MailboxId::new(id),
            name: name.into(),
            readable: true,
            shared_with: Vec::new(),
        }
    }
}

/// Account held entirely in memory. Serves as store, visibility resolver and text oracle.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    owner: String,
    mailboxes: Vec<MailboxEntry>,
    messages: BTreeMap<MessageId, MessageView>,
    index: MemoryTextIndex,
}

impl MemoryStore {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    /// The principal owning every mailbox.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn add_mailbox(&mut self, mailbox: MailboxEntry) {
        self.mailboxes.retain(|m| m.id != mailbox.id);
        self.mailboxes.push(mailbox);
    }

    /// Add a message and index it. Message ids must be unique.
    pub fn add_message(&mut self, view: MessageView, attachment_text: &[String]) -> Result<()> {
        if self.messages.contains_key(&view.id) {
            return Err(QueryError::StoreUnavailable(format!(
                "Duplicate message id '{}'",
                view.id
            )));
        }
        self.index.add(&view, attachment_text);
        self.messages.insert(view.id.clone(), view);
        Ok(())
    }

    pub fn mailboxes(&self) -> &[MailboxEntry] {
        &self.mailboxes
    }

    pub fn message(&self, id: &MessageId) -> Option<&MessageView> {
        self.messages.get(id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageView> {
        self.messages.values()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageStore for MemoryStore {
    fn views_for(&self, mailboxes: &BTreeSet<MailboxId>) -> Result<Vec<MessageView>> {
        Ok(self
            .messages
            .values()
            .filter(|view| !view.mailbox_ids.is_disjoint(mailboxes))
            .cloned()
            .collect())
    }
}

impl VisibleMailboxes for MemoryStore {
    fn visible_mailboxes(&self, principal: &str) -> Result<BTreeSet<MailboxId>> {
        let is_owner = principal == self.owner;
        Ok(self
            .mailboxes
            .iter()
            .filter(|m| {
                if is_owner {
                    m.readable
                } else {
                    m.shared_with.iter().any(|p| p == principal)
                }
            })
            .map(|m| m.id.clone())
            .collect())
    }
}

impl TextIndex for MemoryStore {
    fn matches(&self, scope: TextScope, term: &str, message: &MessageId) -> Result<bool> {
        self.index.matches(scope, term, message)
    }
}
