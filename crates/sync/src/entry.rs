//! Direct user actions: picking a category, entering a transaction by hand,
//! and creating categorization rules.

use chrono::NaiveDate;
use serde::Deserialize;
use tally_core::{
    CategoryId, CategoryRule, LinkedAccount, MatchType, Money, NewCategoryRule, NewLinkedAccount,
    StoreError, Transaction, TransactionId, UserId,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::categorize::Categorizer;
use crate::store::{AccountStore, CategoryStore, TransactionStore};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sets a transaction's category by hand. From now on sync leaves it alone.
pub async fn override_category<S>(
    store: &S,
    user: &UserId,
    id: TransactionId,
    category: Option<CategoryId>,
) -> Result<Transaction, EntryError>
where
    S: TransactionStore + CategoryStore + ?Sized,
{
    let mut tx = store
        .find_for_user(user, id)
        .await?
        .ok_or(EntryError::TransactionNotFound(id))?;
    if let Some(category) = category {
        ensure_category(store, category).await?;
    }
    tx.category_id = category;
    tx.category_override = true;
    let saved = store.upsert(&tx).await?;
    info!(user = %user, transaction = %id, category = ?category, "category overridden");
    Ok(saved)
}

/// The user's `manual` pseudo-account, created on first use.
pub async fn manual_account<S>(
    store: &S,
    user: &UserId,
    account_name: &str,
) -> Result<LinkedAccount, StoreError>
where
    S: AccountStore + ?Sized,
{
    if let Some(existing) = store.find_manual_account(user).await? {
        return Ok(existing);
    }
    store
        .insert_linked_account(NewLinkedAccount::manual(user.clone(), account_name))
        .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualEntry {
    pub date: NaiveDate,
    pub name: String,
    pub amount: Money,
    /// A category chosen here counts as an override.
    pub category_id: Option<CategoryId>,
}

pub async fn add_manual_transaction<S>(
    store: &S,
    user: &UserId,
    entry: ManualEntry,
    currency: &str,
) -> Result<Transaction, EntryError>
where
    S: AccountStore + CategoryStore + TransactionStore + ?Sized,
{
    let name = entry.name.trim();
    if name.is_empty() {
        return Err(EntryError::Missing("name"));
    }

    let account = manual_account(store, user, "Manual").await?;
    let category_id = match entry.category_id {
        Some(id) => {
            ensure_category(store, id).await?;
            Some(id)
        }
        None => {
            Categorizer::new(store)
                .categorize(user, None, name, entry.amount)
                .await?
        }
    };

    let tx = Transaction {
        id: None,
        linked_account_id: account.id,
        provider_tx_id: format!("manual-{}", Uuid::new_v4()),
        date: entry.date,
        name: name.to_string(),
        merchant_name: None,
        amount: entry.amount,
        currency: currency.to_string(),
        category_id,
        category_override: entry.category_id.is_some(),
        pending: false,
    };
    Ok(store.upsert(&tx).await?)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleInput {
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub match_type: String,
    #[serde(default)]
    pub match_value: String,
    pub priority: Option<i32>,
}

/// Creates a rule. The match value is trimmed, an unrecognised match type
/// becomes `contains`, and priority defaults to 0.
pub async fn new_rule<S>(store: &S, user: &UserId, input: RuleInput) -> Result<CategoryRule, EntryError>
where
    S: CategoryStore + ?Sized,
{
    let category_id = input.category_id.ok_or(EntryError::Missing("categoryId"))?;
    let match_value = input.match_value.trim();
    if match_value.is_empty() {
        return Err(EntryError::Missing("matchValue"));
    }
    ensure_category(store, category_id).await?;

    let rule = store
        .insert_rule(NewCategoryRule {
            user_id: user.clone(),
            category_id,
            match_type: MatchType::parse_lenient(&input.match_type),
            match_value: match_value.to_string(),
            priority: input.priority.unwrap_or(0),
        })
        .await?;
    info!(user = %user, match_type = %rule.match_type, priority = rule.priority, "rule created");
    Ok(rule)
}

async fn ensure_category<S>(store: &S, id: CategoryId) -> Result<(), EntryError>
where
    S: CategoryStore + ?Sized,
{
    store
        .find_category(id)
        .await?
        .map(|_| ())
        .ok_or(EntryError::CategoryNotFound(id))
}
