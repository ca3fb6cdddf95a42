//! Filter trees: decoding from JSON and recursive evaluation.
//!
//! A filter is either a *condition* (an object of predicate properties, all of
//! which must hold) or an *operator* `{"operator": "AND"|"OR"|"NOT", "conditions": [...]}`.
//! `NOT` is a NOR: it holds when none of its conditions hold.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::fulltext::TextIndex;
use super::predicate::{self, Predicate};
use super::visibility::Candidate;
use crate::error::{QueryError, Result};
use crate::model::MailboxId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            "NOT" => Ok(Self::Not),
            other => Err(QueryError::invalid(format!(
                "Unknown filter operator '{other}', expected AND, OR or NOT"
            ))),
        }
    }
}

/// A validated filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// All predicates must hold. An empty condition always holds.
    Condition(Vec<Predicate>),
    /// Combinator over a non-empty list of children.
    Operator {
        op: Operator,
        conditions: Vec<FilterNode>,
    },
}

impl FilterNode {
    /// Decode and validate a filter, rejecting operator nesting deeper than `max_depth`.
    pub fn from_json(value: &Value, max_depth: usize) -> Result<Self> {
        Self::parse_at(value, 1, max_depth)
    }

    fn parse_at(value: &Value, depth: usize, max_depth: usize) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| QueryError::invalid("A filter must be a JSON object"))?;

        if !object.contains_key("operator") {
            return parse_condition(object).map(Self::Condition);
        }

        if depth > max_depth {
            return Err(QueryError::invalid(format!(
                "Filter depth is higher than maximum allowed value {max_depth}"
            )));
        }

        let mut op = None;
        let mut children = None;
        for (key, val) in object {
            match key.as_str() {
                "operator" => {
                    let raw = val
                        .as_str()
                        .ok_or_else(|| QueryError::invalid("'operator' must be a string"))?;
                    op = Some(Operator::parse(raw)?);
                }
                "conditions" => {
                    children = Some(
                        val.as_array()
                            .ok_or_else(|| QueryError::invalid("'conditions' must be a list"))?,
                    );
                }
                other => {
                    return Err(QueryError::invalid(format!(
                        "Unknown filter operator property '{other}'"
                    )))
                }
            }
        }

        let op = op.ok_or_else(|| QueryError::invalid("Missing 'operator'"))?;
        let children = children
            .filter(|c| !c.is_empty())
            .ok_or_else(|| QueryError::invalid("'conditions' must be a non-empty list"))?;

        let conditions = children
            .iter()
            .map(|child| Self::parse_at(child, depth + 1, max_depth))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::Operator { op, conditions })
    }

    /// Mailboxes the whole tree is confined to, when its root is a condition with
    /// `inMailboxes`. Used to narrow candidate collection.
    pub fn mailbox_scope(&self) -> Option<&BTreeSet<MailboxId>> {
        match self {
            Self::Condition(predicates) => predicates.iter().find_map(|p| match p {
                Predicate::MailboxIn(ids) => Some(ids),
                _ => None,
            }),
            Self::Operator { .. } => None,
        }
    }
}

/// Decode a condition object. Property order is irrelevant; all must hold.
///
/// In-memory predicates are placed ahead of oracle lookups so a failing
/// flag or mailbox test settles the condition without consulting the index.
fn parse_condition(object: &Map<String, Value>) -> Result<Vec<Predicate>> {
    let mut predicates = object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| Predicate::from_property(name, value))
        .collect::<Result<Vec<_>>>()?;
    predicates.sort_by_key(Predicate::needs_oracle);
    Ok(predicates)
}

/// Evaluate a filter against one candidate. An absent filter selects everything.
pub fn evaluate(node: Option<&FilterNode>, candidate: &Candidate, oracle: &dyn TextIndex) -> Result<bool> {
    match node {
        None => Ok(true),
        Some(node) => evaluate_node(node, candidate, oracle),
    }
}

fn evaluate_node(node: &FilterNode, candidate: &Candidate, oracle: &dyn TextIndex) -> Result<bool> {
    match node {
        FilterNode::Condition(predicates) => {
            for p in predicates {
                if !predicate::matches(p, candidate, oracle)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        FilterNode::Operator { op, conditions } => {
            let mut any = false;
            for child in conditions {
                let hit = evaluate_node(child, candidate, oracle)?;
                match (op, hit) {
                    (Operator::And, false) => return Ok(false),
                    (Operator::Or, true) => return Ok(true),
                    (Operator::Not, true) => return Ok(false),
                    _ => any |= hit,
                }
            }
            Ok(match op {
                Operator::And => true,
                Operator::Or => any,
                Operator::Not => !any,
            })
        }
    }
}
