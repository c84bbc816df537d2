use std::collections::HashMap;

use tally_core::{Category, CategoryId};

use crate::categorize::{CategorizationInput, CategoryStrategy};

/// Merchant keywords per category slug. Scanned top to bottom; the first slug
/// with a keyword inside the search text wins.
pub const DEFAULT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "groceries",
        &["SUPERSTORE", "WALMART", "COSTCO", "SAFEWAY", "LOBLAWS", "METRO", "GROCERY", "FOOD BASICS"],
    ),
    (
        "dining",
        &["RESTAURANT", "UBER EATS", "DOORDASH", "STARBUCKS", "TIM HORTONS", "MCDONALD", "CAFE"],
    ),
    (
        "transport",
        &["UBER", "LYFT", "PETRO", "SHELL", "ESSO", "GAS", "TRANSIT", "TTC", "PARKING"],
    ),
    (
        "bills-utilities",
        &["HYDRO", "ENBRIDGE", "ROGERS", "BELL", "TELUS", "INSURANCE", "RENT"],
    ),
    (
        "entertainment",
        &["NETFLIX", "SPOTIFY", "APPLE.COM/BILL", "AMAZON", "STEAM", "CINE"],
    ),
    ("health", &["PHARMACY", "SHOPPERS", "REXALL", "CLINIC", "DENTAL"]),
    ("travel", &["AIRLINE", "HOTEL", "EXPEDIA", "BOOKING"]),
];

pub fn keyword_slugs() -> Vec<&'static str> {
    DEFAULT_KEYWORDS.iter().map(|(slug, _)| *slug).collect()
}

/// The keyword table bound to the categories that actually exist in the store.
pub struct KeywordTable {
    resolved: HashMap<&'static str, CategoryId>,
}

impl KeywordTable {
    pub fn new(categories: &[Category]) -> Self {
        let resolved = DEFAULT_KEYWORDS
            .iter()
            .filter_map(|(slug, _)| {
                categories
                    .iter()
                    .find(|c| c.slug == *slug)
                    .map(|c| (*slug, c.id))
            })
            .collect();
        Self { resolved }
    }

    /// Slugs without a stored category are skipped, not treated as an error.
    pub fn find_match(&self, text: &str) -> Option<CategoryId> {
        DEFAULT_KEYWORDS.iter().find_map(|(slug, keywords)| {
            let id = self.resolved.get(slug)?;
            keywords
                .iter()
                .any(|k| text.contains(k))
                .then_some(*id)
        })
    }
}

impl CategoryStrategy for KeywordTable {
    fn name(&self) -> &'static str {
        "default-keywords"
    }

    fn decide(&self, input: &CategorizationInput<'_>) -> Option<CategoryId> {
        self.find_match(input.search_text)
    }
}
