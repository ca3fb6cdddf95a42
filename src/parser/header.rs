//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and a lenient date grammar.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use tracing::warn;

/// Parse a raw header block into `(name, decoded_value)` pairs.
///
/// Names keep their original case; values are unfolded and RFC 2047 decoded.
pub fn parse_header_block(raw_headers: &[u8]) -> Vec<(String, String)> {
    let text = decode_header_bytes(raw_headers);
    unfold_headers(&text)
        .into_iter()
        .map(|(name, value)| {
            let decoded = decode_encoded_words(&value);
            (name, decoded)
        })
        .collect()
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                result.push((name.to_string(), value.trim().to_string()));
            }
        }
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Values without encoded-words are returned unchanged.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    // mail-parser decodes unstructured fields, so wrap the value as a Subject.
    let wrapped = format!("Subject: {input}\r\n\r\n");
    MessageParser::default()
        .parse(wrapped.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Find the byte offset where headers end (position of the first blank line).
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    (0..data.len()).find(|&i| data[i..].starts_with(b"\n\n") || data[i..].starts_with(b"\r\n\r\n"))
}

// ── Dates ───────────────────────────────────────────────────────

// Two-digit years first: `%Y` would read "17" as year 17.
const DATE_FORMATS: [&str; 11] = [
    "%d %b %y %H:%M:%S %z",
    "%d %b %y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse an email date string in various common formats.
///
/// Accepts RFC 2822 (including obsolete two-digit years such as
/// `"Wed, 28 Jun 17 09:23:01 +0200"`), RFC 3339, IMAP internal dates,
/// named time zones and a few broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = strip_comment(date_str.trim());
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let candidates = [
        no_dow.clone(),
        normalize_imap_date(&no_dow),
        replace_named_tz(&no_dow),
        replace_named_tz(&normalize_imap_date(&no_dow)),
    ];

    for candidate in &candidates {
        if let Some(dt) = parse_with_formats(candidate) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

fn parse_with_formats(candidate: &str) -> Option<DateTime<Utc>> {
    for fmt in &DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Drop a trailing RFC 5322 comment such as `"(CEST)"`.
fn strip_comment(s: &str) -> &str {
    match s.rfind('(') {
        Some(pos) if s.ends_with(')') => s[..pos].trim_end(),
        _ => s,
    }
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let Some((day, rest)) = s.split_once('-') else {
        return s.to_string();
    };
    let Some((month, rest)) = rest.split_once('-') else {
        return s.to_string();
    };

    match MONTHS.iter().find(|m| m.eq_ignore_ascii_case(month)) {
        Some(title) if day.chars().all(|c| c.is_ascii_digit()) => format!("{day} {title} {rest}"),
        _ => s.to_string(),
    }
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    const ZONES: [(&str, &str); 14] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    for (name, offset) in &ZONES {
        if let Some(prefix) = s.strip_suffix(name) {
            if prefix.ends_with(' ') {
                return format!("{prefix}{offset}");
            }
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(decode_encoded_words("Re: budget"), "Re: budget");
    }

    #[test]
    fn test_unfold_headers_keeps_name_case() {
        let text = "Subject: This is a long\n\tsubject line\nX-Custom: yes\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "Subject");
        assert_eq!(headers[0].1, "This is a long subject line");
        assert_eq!(headers[1].0, "X-Custom");
    }

    #[test]
    fn test_parse_header_block_latin1_fallback() {
        let raw = b"From: M\xfcller <m@example.com>\nSubject: hi\n";
        let headers = parse_header_block(raw);
        assert_eq!(headers[0].1, "Müller <m@example.com>");
    }

    #[test]
    fn test_find_header_end() {
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some(25));
        let crlf = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(crlf), Some(26));
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_two_digit_year() {
        let dt = parse_date("Wed, 28 Jun 17 09:23:01 +0200").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2017-06-28 07:23:01");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let dt = parse_date("Tue, 25 Jul 2017 08:36:11 +0200 (CEST)").unwrap();
        assert_eq!(dt.format("%H").to_string(), "06");
    }

    #[test]
    fn test_parse_date_named_tz() {
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 EST").is_some());
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("   ").is_none());
    }

    #[test]
    fn test_normalize_imap_date() {
        assert_eq!(normalize_imap_date("10-MAR-2025 06:00:42"), "10 Mar 2025 06:00:42");
        assert_eq!(normalize_imap_date("2024-01-04 10:00:00"), "2024-01-04 10:00:00");
    }
}
