//! `mailquery`: a JMAP-style message query engine.
//!
//! Given a principal's visible mailboxes, a message store and a text-search
//! oracle, the engine evaluates recursive `AND`/`OR`/`NOT` filters, applies a
//! stable multi-key sort, paginates and optionally projects message properties.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod search;
pub mod store;
