//! Query request decoding.
//!
//! Every structural check happens here, before any collaborator is consulted.

use serde::Deserialize;
use serde_json::Value;

use super::filter::FilterNode;
use super::materialize::PropertySelection;
use super::paginate::{validate_limit, validate_position};
use super::sort::SortSpec;
use crate::config::QueryConfig;
use crate::error::{QueryError, Result};

/// Wire shape of a query request, before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawQueryRequest {
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    sort: Option<Vec<String>>,
    #[serde(default)]
    position: Option<Value>,
    #[serde(default)]
    limit: Option<Value>,
    #[serde(default)]
    collapse_threads: bool,
    #[serde(default)]
    fetch_messages: bool,
    #[serde(default)]
    fetch_message_properties: Option<Vec<String>>,
    // Accepted for compatibility; threads and snippets are not produced.
    #[serde(default)]
    fetch_threads: bool,
    #[serde(default)]
    fetch_search_snippets: bool,
}

/// A validated query request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub account_id: Option<String>,
    pub filter: Option<FilterNode>,
    /// `None` means the configured default order.
    pub sort: Option<SortSpec>,
    pub position: u64,
    /// `None` means the configured default limit.
    pub limit: Option<u64>,
    pub collapse_threads: bool,
    pub fetch_messages: bool,
    /// `None` means every property.
    pub fetch_message_properties: Option<PropertySelection>,
}

impl QueryRequest {
    /// Decode and validate a JSON request.
    pub fn from_json(value: &Value, config: &QueryConfig) -> Result<Self> {
        let raw: RawQueryRequest = serde_json::from_value(value.clone())
            .map_err(|e| QueryError::invalid(format!("Invalid request: {e}")))?;

        let filter = raw
            .filter
            .as_ref()
            .filter(|f| !f.is_null())
            .map(|f| FilterNode::from_json(f, config.max_filter_depth))
            .transpose()?;

        let sort = match raw.sort.as_deref() {
            None | Some([]) => None,
            Some(items) => Some(SortSpec::parse(items)?),
        };

        let position = validate_position(raw.position.as_ref())?;
        let limit = match raw.limit.as_ref() {
            None | Some(Value::Null) => None,
            Some(v) => Some(validate_limit(Some(v), config.default_limit)?),
        };

        let fetch_message_properties = raw
            .fetch_message_properties
            .as_deref()
            .map(|props| PropertySelection::parse(Some(props)))
            .transpose()?;

        if raw.fetch_threads || raw.fetch_search_snippets {
            tracing::debug!("fetchThreads/fetchSearchSnippets requested, ignoring");
        }

        Ok(Self {
            account_id: raw.account_id,
            filter,
            sort,
            position,
            limit,
            collapse_threads: raw.collapse_threads,
            fetch_messages: raw.fetch_messages,
            fetch_message_properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<QueryRequest> {
        QueryRequest::from_json(&value, &QueryConfig::default())
    }

    #[test]
    fn test_empty_request() {
        let req = decode(json!({})).unwrap();
        assert!(req.filter.is_none());
        assert!(req.sort.is_none());
        assert_eq!(req.position, 0);
        assert_eq!(req.limit, None);
        assert!(!req.fetch_messages);
    }

    #[test]
    fn test_full_request() {
        let req = decode(json!({
            "accountId": "alice",
            "filter": {"isFlagged": true},
            "sort": ["size asc"],
            "position": 2,
            "limit": 5,
            "collapseThreads": true,
            "fetchMessages": true,
            "fetchMessageProperties": ["subject"]
        }))
        .unwrap();
        assert_eq!(req.account_id.as_deref(), Some("alice"));
        assert!(req.filter.is_some());
        assert_eq!(req.sort.unwrap().to_strings(), vec!["size asc"]);
        assert_eq!((req.position, req.limit), (2, Some(5)));
        assert!(req.collapse_threads);
        assert_eq!(
            req.fetch_message_properties.unwrap().names(),
            vec!["id", "subject"]
        );
    }

    #[test]
    fn test_empty_sort_uses_default() {
        let req = decode(json!({"sort": []})).unwrap();
        assert!(req.sort.is_none());
    }

    #[test]
    fn test_validation_errors() {
        for bad in [
            json!({"position": 9007199254740992u64}),
            json!({"limit": -1}),
            json!({"sort": ["color asc"]}),
            json!({"fetchMessageProperties": ["color"]}),
            json!({"filter": {"header": ["X-Only-Name"]}}),
            json!({"filter": {"unknownProperty": 1}}),
            json!({"unknownField": true}),
            json!({"sort": "date"}),
        ] {
            let err = decode(bad.clone()).unwrap_err();
            assert_eq!(err.kind(), "invalidArguments", "for {bad}");
        }
    }

    #[test]
    fn test_depth_uses_configured_maximum() {
        let config = QueryConfig {
            max_filter_depth: 1,
            ..QueryConfig::default()
        };
        let nested = json!({"filter": {"operator": "AND", "conditions": [
            {"operator": "OR", "conditions": [{}]}
        ]}});
        let err = QueryRequest::from_json(&nested, &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Filter depth is higher than maximum allowed value 1"
        );
    }
}
