//! Email parsing: header decoding, lenient dates, EML files, and MIME handling.

pub mod eml;
pub mod header;
pub mod mime;
