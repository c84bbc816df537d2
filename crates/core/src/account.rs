use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkedAccountId(pub i64);

impl fmt::Display for LinkedAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a linked account's transactions come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Plaid,
    /// Hand-entered or file-imported transactions; never synced.
    Manual,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Plaid => write!(f, "plaid"),
            Provider::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plaid" => Ok(Provider::Plaid),
            "manual" => Ok(Provider::Manual),
            other => Err(format!("Unknown provider: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: LinkedAccountId,
    pub user_id: UserId,
    pub provider: Provider,
    pub provider_item_id: Option<String>,
    /// Opaque credential handed to the provider on every fetch.
    pub access_token: String,
    pub account_name: Option<String>,
    pub institution_name: Option<String>,
}

impl LinkedAccount {
    pub fn is_syncable(&self) -> bool {
        self.provider != Provider::Manual
    }

    /// Label used in sync error messages: the account name, else its id.
    pub fn label(&self) -> String {
        self.account_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Fields needed to create a linked account; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLinkedAccount {
    pub user_id: UserId,
    pub provider: Provider,
    pub provider_item_id: Option<String>,
    pub access_token: String,
    pub account_name: Option<String>,
    pub institution_name: Option<String>,
}

impl NewLinkedAccount {
    pub fn manual(user_id: UserId, account_name: &str) -> Self {
        NewLinkedAccount {
            user_id,
            provider: Provider::Manual,
            provider_item_id: None,
            access_token: "manual".to_string(),
            account_name: Some(account_name.to_string()),
            institution_name: Some("Manual entries".to_string()),
        }
    }
}
