use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::LinkedAccountId;
use crate::category::CategoryId;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locally stored transaction. `provider_tx_id` is unique across the store
/// and is the key every sync upserts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<TransactionId>,
    pub linked_account_id: LinkedAccountId,
    pub provider_tx_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub merchant_name: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub category_id: Option<CategoryId>,
    /// Set once a person has picked the category; automated categorization
    /// must leave `category_id` alone from then on.
    pub category_override: bool,
    pub pending: bool,
}

/// One record as reported by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTransaction {
    pub provider_tx_id: String,
    pub date: NaiveDate,
    pub name: Option<String>,
    pub merchant_name: Option<String>,
    pub amount: Money,
    pub currency: Option<String>,
    pub pending: Option<bool>,
}

impl RemoteTransaction {
    pub fn is_pending(&self) -> bool {
        self.pending == Some(true)
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// A transaction joined with the labels needed for listings and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionListing {
    pub transaction: Transaction,
    pub account_label: String,
    pub category_name: Option<String>,
}
