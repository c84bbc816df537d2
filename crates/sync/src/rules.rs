use tally_core::{CategoryId, CategoryRule, MatchType};

use crate::categorize::{CategorizationInput, CategoryStrategy};

/// Uppercased merchant name and name, space-joined, empty parts dropped.
pub fn search_text(merchant_name: Option<&str>, name: &str) -> String {
    [merchant_name.unwrap_or(""), name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Internal pairing of a rule with its uppercased match value.
struct PreparedRule {
    rule: CategoryRule,
    needle: String,
}

impl PreparedRule {
    fn matches(&self, text: &str) -> bool {
        match self.rule.match_type {
            MatchType::Equals => text == self.needle,
            MatchType::StartsWith => text.starts_with(&self.needle),
            MatchType::Contains => text.contains(&self.needle),
        }
    }
}

/// A user's rules in evaluation order.
pub struct RuleMatcher {
    rules: Vec<PreparedRule>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let mut prepared: Vec<PreparedRule> = rules
            .into_iter()
            .map(|rule| PreparedRule {
                needle: rule.match_value.to_uppercase(),
                rule,
            })
            .collect();
        // Highest priority first. Equal priorities fall back to the uppercased
        // match value, the same text the rule is matched with.
        prepared.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then_with(|| a.needle.cmp(&b.needle))
        });
        Self { rules: prepared }
    }

    /// `text` must already be normalised with [`search_text`].
    pub fn find_matching_rule(&self, text: &str) -> Option<&CategoryRule> {
        if text.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|pr| pr.matches(text))
            .map(|pr| &pr.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl CategoryStrategy for RuleMatcher {
    fn name(&self) -> &'static str {
        "user-rules"
    }

    fn decide(&self, input: &CategorizationInput<'_>) -> Option<CategoryId> {
        self.find_matching_rule(input.search_text)
            .map(|rule| rule.category_id)
    }
}
