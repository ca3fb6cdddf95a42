//! Message stores: where candidate views come from.

pub mod memory;
pub mod snapshot;

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{MailboxId, MessageView};

/// Lists the messages held by a set of mailboxes.
///
/// A message present in several requested mailboxes may be returned once per
/// mailbox; the engine deduplicates. Failures are reported as
/// [`crate::error::QueryError::StoreUnavailable`].
pub trait MessageStore: Send + Sync {
    fn views_for(&self, mailboxes: &BTreeSet<MailboxId>) -> Result<Vec<MessageView>>;
}
