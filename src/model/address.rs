//! Email address parsing (RFC 5322 §3.4).

use serde::{Deserialize, Serialize};

/// A parsed email address, serialized as a JMAP `Emailer`.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `name = "Juan García"`, `email = "juan@ejemplo.com"`
/// - `"user@example.com"` → `name = ""`, `email = "user@example.com"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub name: String,
    /// The bare email address (`user@domain`), or the raw text when unparseable.
    pub email: String,
}

impl EmailAddress {
    /// Parse a single address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// Anything else is kept verbatim in `email`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: strip_quotes(&trimmed[..open]),
                    email: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self {
            name: String::new(),
            email: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    results.extend(Self::non_empty(&current));
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        results.extend(Self::non_empty(&current));

        results
    }

    fn non_empty(segment: &str) -> Option<Self> {
        let addr = Self::parse(segment);
        (!addr.email.is_empty()).then_some(addr)
    }

    /// Format for display: `"Display Name <email>"` or just `"email"`.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }

    /// Every textual form a filter value may be compared with:
    /// the full display form, the name and the bare address.
    pub fn match_forms(&self) -> Vec<String> {
        let mut forms = vec![self.display(), self.email.clone()];
        if !self.name.is_empty() {
            forms.push(self.name.clone());
        }
        forms
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
