//! Visibility adapter and candidate collection.
//!
//! Access rights are computed elsewhere; the engine only intersects message
//! membership with the readable mailbox set it is handed, then deduplicates
//! messages that live in several visible mailboxes.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::Result;
use crate::model::{MailboxId, MessageId, MessageView};
use crate::store::MessageStore;

/// Resolves the mailboxes a principal may read (owned and delegated).
///
/// A resolution failure must be reported as
/// [`crate::error::QueryError::VisibilityUnavailable`], never as an empty set.
pub trait VisibleMailboxes: Send + Sync {
    fn visible_mailboxes(&self, principal: &str) -> Result<BTreeSet<MailboxId>>;
}

/// A message reachable through the visible mailbox set.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub view: MessageView,
    /// The message's containers restricted to visible mailboxes. Never empty.
    pub mailboxes: BTreeSet<MailboxId>,
}

impl Candidate {
    pub fn id(&self) -> &MessageId {
        &self.view.id
    }
}

/// Gather visible messages, one entry per message identity.
///
/// `scope` narrows the store lookup to a top-level `inMailboxes` constraint;
/// it is intersected with `visible`, so unknown or unreadable ids contribute nothing.
/// The result is ordered by ascending message id.
pub fn collect_candidates(
    store: &dyn MessageStore,
    visible: &BTreeSet<MailboxId>,
    scope: Option<&BTreeSet<MailboxId>>,
) -> Result<Vec<Candidate>> {
    let lookup: BTreeSet<MailboxId> = match scope {
        Some(wanted) => visible.intersection(wanted).cloned().collect(),
        None => visible.clone(),
    };

    if lookup.is_empty() {
        debug!("No visible mailbox in scope");
        return Ok(Vec::new());
    }

    let mut by_id: BTreeMap<MessageId, Candidate> = BTreeMap::new();
    let mut seen = 0usize;

    for view in store.views_for(&lookup)? {
        seen += 1;
        if by_id.contains_key(&view.id) {
            continue;
        }
        let mailboxes: BTreeSet<MailboxId> =
            view.mailbox_ids.intersection(visible).cloned().collect();
        if mailboxes.is_empty() {
            continue;
        }
        by_id.insert(view.id.clone(), Candidate { view, mailboxes });
    }

    debug!(
        mailboxes = lookup.len(),
        views = seen,
        candidates = by_id.len(),
        "Collected candidates"
    );
    Ok(by_id.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::model::message::tests::make_view;

    /// Store that returns one view per (message, mailbox) pair, like a per-mailbox listing.
    struct PerMailboxStore(Vec<MessageView>);

    impl MessageStore for PerMailboxStore {
        fn views_for(&self, mailboxes: &BTreeSet<MailboxId>) -> Result<Vec<MessageView>> {
            let mut out = Vec::new();
            for mailbox in mailboxes {
                for view in &self.0 {
                    if view.mailbox_ids.contains(mailbox) {
                        out.push(view.clone());
                    }
                }
            }
            Ok(out)
        }
    }

    struct BrokenStore;

    impl MessageStore for BrokenStore {
        fn views_for(&self, _: &BTreeSet<MailboxId>) -> Result<Vec<MessageView>> {
            Err(QueryError::StoreUnavailable("backend down".into()))
        }
    }

    fn ids(names: &[&str]) -> BTreeSet<MailboxId> {
        names.iter().map(|n| MailboxId::new(*n)).collect()
    }

    #[test]
    fn test_message_in_two_mailboxes_collected_once() {
        let store = PerMailboxStore(vec![make_view("m1", &["inbox", "archive"])]);
        let got = collect_candidates(&store, &ids(&["inbox", "archive"]), None).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].mailboxes, ids(&["archive", "inbox"]));
    }

    #[test]
    fn test_invisible_containers_are_hidden() {
        let store = PerMailboxStore(vec![
            make_view("m1", &["inbox", "secret"]),
            make_view("m2", &["secret"]),
        ]);
        let got = collect_candidates(&store, &ids(&["inbox"]), None).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id().as_str(), "m1");
        assert_eq!(got[0].mailboxes, ids(&["inbox"]));
    }

    #[test]
    fn test_scope_intersects_visible() {
        let store = PerMailboxStore(vec![
            make_view("m1", &["inbox"]),
            make_view("m2", &["archive"]),
        ]);
        let visible = ids(&["inbox", "archive"]);
        let got = collect_candidates(&store, &visible, Some(&ids(&["archive", "nope"]))).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id().as_str(), "m2");

        let none = collect_candidates(&store, &visible, Some(&ids(&["unknown"]))).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_ordered_by_message_id() {
        let store = PerMailboxStore(vec![
            make_view("c", &["inbox"]),
            make_view("a", &["inbox"]),
            make_view("b", &["inbox"]),
        ]);
        let got = collect_candidates(&store, &ids(&["inbox"]), None).unwrap();
        let order: Vec<&str> = got.iter().map(|c| c.id().as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_store_failure_propagates() {
        let err = collect_candidates(&BrokenStore, &ids(&["inbox"]), None).unwrap_err();
        assert!(err.is_collaborator_failure());
    }
}
