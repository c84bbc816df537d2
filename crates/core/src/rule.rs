use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::UserId;
use crate::category::CategoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[default]
    #[serde(rename = "contains")]
    Contains,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Equals => "equals",
            MatchType::StartsWith => "startsWith",
            MatchType::Contains => "contains",
        }
    }

    /// Reads a stored or user-supplied match type. Anything unrecognised is
    /// treated as `contains`. Use `str::parse` where a typo should be an error.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(MatchType::Equals),
            "startsWith" => Ok(MatchType::StartsWith),
            "contains" => Ok(MatchType::Contains),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

/// A user's rule mapping transaction text to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: RuleId,
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub match_type: MatchType,
    /// Compared case-insensitively.
    pub match_value: String,
    /// Higher is evaluated first.
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategoryRule {
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub match_type: MatchType,
    pub match_value: String,
    pub priority: i32,
}
