//! Loader for individual `.eml` files (single RFC 5322 messages).

use std::path::Path;

use crate::error::{QueryError, Result};
use crate::parser::mime::{parse_message, ParsedMessage};

/// Read and parse a single `.eml` file.
pub fn load_eml(path: impl AsRef<Path>) -> Result<ParsedMessage> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| QueryError::io(path, e))?;
    parse_message(&data).map_err(|e| match e {
        QueryError::MimeError(reason) => QueryError::Snapshot {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}
