//! Stable multi-key sorting of query candidates.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::visibility::Candidate;
use crate::error::{QueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Date,
    Subject,
    From,
    To,
    Size,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "id" => Self::Id,
            "date" => Self::Date,
            "subject" => Self::Subject,
            "from" => Self::From,
            "to" => Self::To,
            "size" => Self::Size,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Date => "date",
            Self::Subject => "subject",
            Self::From => "from",
            Self::To => "to",
            Self::Size => "size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: Direction,
}

impl SortKey {
    /// Parse `"field"`, `"field asc"` or `"field desc"`. A bare field sorts descending.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split_whitespace();
        let field = parts
            .next()
            .and_then(SortField::parse)
            .ok_or_else(|| QueryError::invalid(format!("Unsupported sort '{raw}'")))?;
        let direction = match parts.next() {
            None | Some("desc") => Direction::Desc,
            Some("asc") => Direction::Asc,
            Some(_) => {
                return Err(QueryError::invalid(format!(
                    "Unsupported sort direction in '{raw}', expected asc or desc"
                )))
            }
        };
        if parts.next().is_some() {
            return Err(QueryError::invalid(format!("Unsupported sort '{raw}'")));
        }
        Ok(Self { field, direction })
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{} {dir}", self.field.as_str())
    }
}

/// Ordered, non-empty list of sort keys; the first is the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        if items.is_empty() {
            return Err(QueryError::invalid("Sort must contain at least one key"));
        }
        items
            .iter()
            .map(|s| SortKey::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Canonical `"field dir"` strings, echoed in query results.
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(SortKey::to_string).collect()
    }
}

impl Default for SortSpec {
    /// Newest first.
    fn default() -> Self {
        Self(vec![SortKey {
            field: SortField::Date,
            direction: Direction::Desc,
        }])
    }
}

/// Values compared by the sort, computed once per candidate.
struct SortRow<'a> {
    candidate: &'a Candidate,
    date: DateTime<Utc>,
    subject: &'a str,
    from: &'a str,
    to: &'a str,
}

impl<'a> SortRow<'a> {
    fn new(candidate: &'a Candidate) -> Self {
        let view = &candidate.view;
        Self {
            candidate,
            date: view.sent_at(),
            subject: view.subject(),
            from: view.header("from").unwrap_or(""),
            to: view.header("to").unwrap_or(""),
        }
    }

    fn compare(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::Id => self.candidate.id().cmp(other.candidate.id()),
            SortField::Date => self.date.cmp(&other.date),
            SortField::Subject => self.subject.cmp(other.subject),
            SortField::From => self.from.cmp(other.from),
            SortField::To => self.to.cmp(other.to),
            SortField::Size => self.candidate.view.size.cmp(&other.candidate.view.size),
        }
    }
}

/// Sort candidates in place. Elements equal on every key keep their relative order.
pub fn sort_candidates(candidates: &mut Vec<Candidate>, spec: &SortSpec) {
    let order: Vec<usize> = {
        let rows: Vec<SortRow<'_>> = candidates.iter().map(SortRow::new).collect();
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| {
            spec.keys()
                .iter()
                .map(|key| {
                    let ord = rows[a].compare(&rows[b], key.field);
                    match key.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        order
    };

    let mut slots: Vec<Option<Candidate>> = candidates.drain(..).map(Some).collect();
    candidates.extend(order.into_iter().filter_map(|i| slots[i].take()));
}
