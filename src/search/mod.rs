//! Query engine: visibility, candidate collection, filtering, sorting,
//! pagination and projection.
//!
//! ```text
//! request ─▶ visible mailboxes ─▶ candidates ─▶ filter ─▶ sort ─▶ page ─▶ ids (+ messages)
//! ```

pub mod filter;
pub mod fulltext;
pub mod materialize;
pub mod paginate;
pub mod predicate;
pub mod request;
pub mod rules;
pub mod sort;
pub mod visibility;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::model::MessageId;
use crate::store::MessageStore;

use self::fulltext::TextIndex;
use self::materialize::PropertySelection;
use self::request::QueryRequest;
use self::sort::SortSpec;
use self::visibility::{Candidate, VisibleMailboxes};

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Sort actually applied, as canonical `"field dir"` strings.
    pub sort: Vec<String>,
    pub collapse_threads: bool,
    pub position: u64,
    /// Number of matches before pagination.
    pub total: usize,
    pub message_ids: Vec<MessageId>,
    /// Projections parallel to `message_ids`, present when `fetchMessages` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Map<String, Value>>>,
}

/// Stateless query evaluator over borrowed collaborators.
pub struct QueryEngine<'a> {
    store: &'a dyn MessageStore,
    visibility: &'a dyn VisibleMailboxes,
    index: &'a dyn TextIndex,
    config: QueryConfig,
    default_sort: SortSpec,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        store: &'a dyn MessageStore,
        visibility: &'a dyn VisibleMailboxes,
        index: &'a dyn TextIndex,
        config: QueryConfig,
    ) -> Self {
        let default_sort = SortSpec::parse(&config.default_sort).unwrap_or_else(|e| {
            warn!(
                sort = ?config.default_sort,
                error = %e,
                "Invalid default sort in config, using date desc"
            );
            SortSpec::default()
        });
        Self {
            store,
            visibility,
            index,
            config,
            default_sort,
        }
    }

    /// Decode and validate a JSON request against this engine's limits.
    pub fn parse_request(&self, value: &Value) -> Result<QueryRequest> {
        QueryRequest::from_json(value, &self.config)
    }

    /// Run a validated request on behalf of `principal`.
    pub fn execute(&self, principal: &str, request: &QueryRequest) -> Result<QueryResult> {
        self.execute_with_progress(principal, request, &|_, _| true)
    }

    /// Like [`execute`](Self::execute), reporting `(evaluated, total)` per candidate.
    ///
    /// Returning `false` from `progress` aborts with [`QueryError::Cancelled`].
    pub fn execute_with_progress(
        &self,
        principal: &str,
        request: &QueryRequest,
        progress: &dyn Fn(usize, usize) -> bool,
    ) -> Result<QueryResult> {
        let sort = match &request.sort {
            Some(sort) => sort.clone(),
            None => self.default_sort.clone(),
        };
        let limit = request.limit.unwrap_or(self.config.default_limit);

        let visible = self.visibility.visible_mailboxes(principal)?;
        debug!(principal, visible = visible.len(), "Resolved visible mailboxes");

        let scope = request.filter.as_ref().and_then(|f| f.mailbox_scope());
        let candidates = visibility::collect_candidates(self.store, &visible, scope)?;

        let mut matched = self.filter_candidates(candidates, request, progress)?;
        sort::sort_candidates(&mut matched, &sort);

        let total = matched.len();
        let page = paginate::paginate(&matched, request.position, limit);
        debug!(
            total,
            position = request.position,
            limit,
            returned = page.len(),
            "Query evaluated"
        );

        let messages = request.fetch_messages.then(|| {
            let all = PropertySelection::all();
            let selection = request.fetch_message_properties.as_ref().unwrap_or(&all);
            page.iter()
                .map(|c| materialize::project(c, selection, self.config.preview_length))
                .collect::<Vec<_>>()
        });

        Ok(QueryResult {
            sort: sort.to_strings(),
            collapse_threads: request.collapse_threads,
            position: request.position,
            total,
            message_ids: page.iter().map(|c| c.id().clone()).collect(),
            messages,
        })
    }

    /// Decode and run a JSON request in one step.
    pub fn query_json(&self, principal: &str, request: &Value) -> Result<QueryResult> {
        let request = self.parse_request(request)?;
        self.execute(principal, &request)
    }

    fn filter_candidates(
        &self,
        candidates: Vec<Candidate>,
        request: &QueryRequest,
        progress: &dyn Fn(usize, usize) -> bool,
    ) -> Result<Vec<Candidate>> {
        let total = candidates.len();
        let mut matched = Vec::with_capacity(total);

        for (i, candidate) in candidates.into_iter().enumerate() {
            if !progress(i, total) {
                debug!("Query cancelled at {i}/{total}");
                return Err(QueryError::Cancelled);
            }
            if filter::evaluate(request.filter.as_ref(), &candidate, self.index)? {
                matched.push(candidate);
            }
        }

        if !progress(total, total) {
            debug!("Query cancelled after evaluating {total} candidate(s)");
            return Err(QueryError::Cancelled);
        }
        debug!(candidates = total, matched = matched.len(), "Filter applied");
        Ok(matched)
    }
}
