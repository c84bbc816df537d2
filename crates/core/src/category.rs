use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Income => write!(f, "income"),
            CategoryKind::Expense => write!(f, "expense"),
        }
    }
}

impl std::str::FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(format!("Unknown category kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub kind: CategoryKind,
}

/// Slug of the category the income heuristic falls back to.
pub const INCOME_SLUG: &str = "income";

pub const DEFAULT_CATEGORIES: &[(&str, &str, CategoryKind)] = &[
    ("Groceries", "groceries", CategoryKind::Expense),
    ("Dining", "dining", CategoryKind::Expense),
    ("Transport", "transport", CategoryKind::Expense),
    ("Bills & Utilities", "bills-utilities", CategoryKind::Expense),
    ("Shopping", "shopping", CategoryKind::Expense),
    ("Entertainment", "entertainment", CategoryKind::Expense),
    ("Health", "health", CategoryKind::Expense),
    ("Travel", "travel", CategoryKind::Expense),
    ("Personal", "personal", CategoryKind::Expense),
    ("Income", INCOME_SLUG, CategoryKind::Income),
    ("Transfer", "transfer", CategoryKind::Expense),
    ("Uncategorized", "uncategorized", CategoryKind::Expense),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_unique_slugs() {
        let mut slugs: Vec<&str> = DEFAULT_CATEGORIES.iter().map(|c| c.1).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn income_is_the_only_income_default() {
        let income: Vec<&str> = DEFAULT_CATEGORIES
            .iter()
            .filter(|c| c.2 == CategoryKind::Income)
            .map(|c| c.1)
            .collect();
        assert_eq!(income, vec![INCOME_SLUG]);
    }
}
