//! Attachment metadata.
//!
//! Attachment content is owned by the store; queries only see names and shape.

use serde::{Deserialize, Serialize};

/// Metadata about one MIME attachment part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    /// Filename of the attachment. Empty when the part carries none.
    #[serde(default)]
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Decoded size in bytes.
    #[serde(default)]
    pub size: u64,

    /// `true` if the part is inline (embedded in HTML), `false` if a regular attachment.
    #[serde(default)]
    pub is_inline: bool,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}
