//! Core data model: message snapshots, keywords, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod keyword;
pub mod message;

pub use message::{MailboxId, MessageBody, MessageId, MessageView};
