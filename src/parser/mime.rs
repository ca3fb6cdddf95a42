//! MIME message parsing: headers, body parts, attachment listing, HTML-to-text conversion.

use mail_parser::{MessageParser, MimeHeaders};

use crate::error::{QueryError, Result};
use crate::model::attachment::AttachmentMeta;
use crate::model::MessageBody;
use crate::parser::header::{find_header_end, parse_header_block};

/// Everything the store needs from one raw RFC 5322 message.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub headers: Vec<(String, String)>,
    pub body: MessageBody,
    pub attachments: Vec<AttachmentMeta>,
    /// Decoded content of `text/*` attachments, for the text index.
    pub attachment_text: Vec<String>,
    /// Raw size in bytes.
    pub size: u64,
}

/// Parse a complete raw message (headers + body).
///
/// Header fields come from the raw header block so names and order are preserved;
/// body parts and attachments come from `mail-parser`.
pub fn parse_message(raw_message: &[u8]) -> Result<ParsedMessage> {
    let message_bytes = raw_message
        .strip_prefix(b"\xEF\xBB\xBF")
        .unwrap_or(raw_message);

    let header_end = find_header_end(message_bytes).unwrap_or(message_bytes.len());
    let headers = parse_header_block(&message_bytes[..header_end]);

    let msg = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| QueryError::MimeError("Failed to parse message".into()))?;

    let text = msg.body_text(0).map(|s| s.into_owned());
    let html = msg.body_html(0).map(|s| s.into_owned());

    // mail-parser synthesizes a text part from HTML-only messages; keep only real ones.
    let has_text_part = msg.text_bodies().any(|part| {
        part.content_type()
            .map(|ct: &mail_parser::ContentType| {
                ct.ctype().eq_ignore_ascii_case("text") && ct.subtype() != Some("html")
            })
            .unwrap_or(true)
    });

    Ok(ParsedMessage {
        headers,
        body: MessageBody {
            text: if has_text_part { text } else { None },
            html,
        },
        attachments: list_attachments_from_parsed(&msg),
        attachment_text: attachment_text_from_parsed(&msg),
        size: raw_message.len() as u64,
    })
}

/// Build attachment metadata from a parsed `mail_parser::Message`.
fn list_attachments_from_parsed(msg: &mail_parser::Message<'_>) -> Vec<AttachmentMeta> {
    msg.attachments()
        .map(|part| {
            let content_type = part
                .content_type()
                .map(|ct: &mail_parser::ContentType| match ct.subtype() {
                    Some(sub) => format!("{}/{sub}", ct.ctype()),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());

            let is_inline = part
                .content_disposition()
                .map(|d: &mail_parser::ContentType| d.ctype().eq_ignore_ascii_case("inline"))
                .unwrap_or(false);

            AttachmentMeta {
                filename: part.attachment_name().unwrap_or_default().to_string(),
                content_type,
                size: part.contents().len() as u64,
                is_inline,
            }
        })
        .collect()
}

/// Decoded text of every `text/*` attachment; HTML attachments are flattened.
fn attachment_text_from_parsed(msg: &mail_parser::Message<'_>) -> Vec<String> {
    msg.attachments()
        .filter_map(|part| {
            let ct = part.content_type()?;
            if !ct.ctype().eq_ignore_ascii_case("text") {
                return None;
            }
            let text = part.text_contents()?;
            Some(match ct.subtype() {
                Some(sub) if sub.eq_ignore_ascii_case("html") => html_to_text(text),
                _ => text.to_string(),
            })
        })
        .collect()
}

/// Convert HTML to plain text.
///
/// - Preserves line breaks from `<br>`, `<p>`, `<div>`
/// - Removes scripts and styles
/// - Decodes common HTML entities
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in ["br", "br/", "br /"] {
        text = text.replace(&format!("<{tag}>"), "\n");
        text = text.replace(&format!("<{}>", tag.to_uppercase()), "\n");
    }
    for tag in ["p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6"] {
        let upper = tag.to_uppercase();
        for name in [tag, upper.as_str()] {
            text = text.replace(&format!("<{name}>"), "\n");
            text = text.replace(&format!("<{name} "), "\n<");
            text = text.replace(&format!("</{name}>"), "\n");
        }
    }

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    const ENTITIES: [(&str, &str); 8] = [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&amp;", "&"),
    ];
    for (entity, replacement) in ENTITIES {
        stripped = stripped.replace(entity, replacement);
    }

    // Collapse runs of blank lines into one
    let mut cleaned = String::with_capacity(stripped.len());
    let mut prev_was_blank = false;
    for line in stripped.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
            }
            prev_was_blank = true;
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_lowercase();
    if lower.len() != html.len() {
        // Case folding changed byte offsets; leave the markup alone.
        return html.to_string();
    }

    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(&open).map(|s| s + pos) {
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}
