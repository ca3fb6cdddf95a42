//! Mail filtering rules: header conditions that route a message into mailboxes.

use serde::{Deserialize, Serialize};

use crate::model::address::EmailAddress;
use crate::model::{MailboxId, MessageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    From,
    To,
    Cc,
    Subject,
    /// `to` and `cc` together.
    Recipient,
}

impl RuleField {
    fn headers(self) -> &'static [&'static str] {
        match self {
            Self::From => &["from"],
            Self::To => &["to"],
            Self::Cc => &["cc"],
            Self::Subject => &["subject"],
            Self::Recipient => &["to", "cc"],
        }
    }

    fn is_address(self) -> bool {
        !matches!(self, Self::Subject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparator {
    Contains,
    NotContains,
    ExactlyEquals,
    NotExactlyEquals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: RuleField,
    pub comparator: Comparator,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    pub append_in: Vec<MailboxId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub condition: RuleCondition,
    pub action: RuleAction,
}

impl RuleCondition {
    pub fn matches(&self, message: &MessageView) -> bool {
        let values = self.values(message);
        let needle = self.value.to_lowercase();
        match self.comparator {
            Comparator::Contains => values.iter().any(|v| v.contains(&needle)),
            Comparator::NotContains => !values.iter().any(|v| v.contains(&needle)),
            Comparator::ExactlyEquals => values.iter().any(|v| *v == needle),
            Comparator::NotExactlyEquals => !values.iter().any(|v| *v == needle),
        }
    }

    /// Lowercased strings the comparator is applied to.
    fn values(&self, message: &MessageView) -> Vec<String> {
        let mut out = Vec::new();
        for name in self.field.headers() {
            for raw in message.header_values(name) {
                if self.field.is_address() {
                    out.extend(
                        EmailAddress::parse_list(raw)
                            .iter()
                            .flat_map(EmailAddress::match_forms)
                            .map(|form| form.to_lowercase()),
                    );
                }
                out.push(raw.trim().to_lowercase());
            }
        }
        out
    }
}

/// Target mailboxes of every matching rule, in rule order without duplicates.
pub fn apply(rules: &[Rule], message: &MessageView) -> Vec<MailboxId> {
    let mut targets: Vec<MailboxId> = Vec::new();
    for rule in rules.iter().filter(|r| r.condition.matches(message)) {
        tracing::debug!(rule = %rule.id, message = %message.id, "Rule matched");
        for mailbox in &rule.action.append_in {
            if !targets.contains(mailbox) {
                targets.push(mailbox.clone());
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::tests::make_view;
    use serde_json::json;

    fn rule(id: &str, field: RuleField, comparator: Comparator, value: &str, target: &str) -> Rule {
        Rule {
            id: id.into(),
            name: String::new(),
            condition: RuleCondition {
                field,
                comparator,
                value: value.into(),
            },
            action: RuleAction {
                append_in: vec![MailboxId::new(target)],
            },
        }
    }

    fn message() -> MessageView {
        let mut view = make_view("m1", &["inbox"]);
        view.headers
            .push(("Cc".into(), "\"Carol C.\" <carol@example.org>".into()));
        view
    }

    #[test]
    fn test_contains_and_not_contains() {
        let m = message();
        assert!(rule("r", RuleField::From, Comparator::Contains, "ALICE", "x").condition.matches(&m));
        assert!(rule("r", RuleField::Subject, Comparator::NotContains, "invoice", "x").condition.matches(&m));
        assert!(!rule("r", RuleField::To, Comparator::NotContains, "bob", "x").condition.matches(&m));
    }

    #[test]
    fn test_exactly_equals_address_forms() {
        let m = message();
        for value in ["alice@example.com", "Alice", "Alice <alice@example.com>"] {
            assert!(
                rule("r", RuleField::From, Comparator::ExactlyEquals, value, "x").condition.matches(&m),
                "{value}"
            );
        }
        assert!(!rule("r", RuleField::From, Comparator::ExactlyEquals, "ali", "x").condition.matches(&m));
        assert!(rule("r", RuleField::From, Comparator::NotExactlyEquals, "ali", "x").condition.matches(&m));
    }

    #[test]
    fn test_recipient_covers_to_and_cc() {
        let m = message();
        assert!(rule("r", RuleField::Recipient, Comparator::Contains, "carol@", "x").condition.matches(&m));
        assert!(rule("r", RuleField::Recipient, Comparator::ExactlyEquals, "bob@example.com", "x").condition.matches(&m));
    }

    #[test]
    fn test_absent_header() {
        let mut m = message();
        m.headers.retain(|(k, _)| k != "Cc");
        assert!(!rule("r", RuleField::Cc, Comparator::Contains, "", "x").condition.matches(&m));
        assert!(rule("r", RuleField::Cc, Comparator::NotContains, "carol", "x").condition.matches(&m));
    }

    #[test]
    fn test_apply_dedups_in_rule_order() {
        let rules = vec![
            rule("1", RuleField::Subject, Comparator::Contains, "message", "work"),
            rule("2", RuleField::From, Comparator::Contains, "nobody", "spam"),
            rule("3", RuleField::To, Comparator::Contains, "bob", "archive"),
            rule("4", RuleField::From, Comparator::Contains, "alice", "work"),
        ];
        let got = apply(&rules, &message());
        assert_eq!(got, vec![MailboxId::new("work"), MailboxId::new("archive")]);
    }

    #[test]
    fn test_rule_json_shape() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "r1",
            "name": "Move invoices",
            "condition": {"field": "subject", "comparator": "not-exactly-equals", "value": "x"},
            "action": {"appendIn": ["mbx-1"]}
        }))
        .unwrap();
        assert_eq!(rule.condition.comparator, Comparator::NotExactlyEquals);
        assert_eq!(rule.action.append_in, vec![MailboxId::new("mbx-1")]);
    }
}
