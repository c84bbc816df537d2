use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use tally_core::{CategoryId, DateRange, LinkedAccount, Money, NewLinkedAccount, Provider, TransactionId, UserId};
use tally_storage::SqliteStore;
use tally_sync::{
    AccountStore, BudgetInput, CategoryStore, ManualEntry, Paginated, PlaidClient, Reconciler,
    RuleInput, SyncOptions, TransactionProvider,
};
use tracing::{info, warn};

use crate::config::Config;

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize output")
}

async fn category_by_slug(store: &SqliteStore, slug: &str) -> Result<CategoryId> {
    store
        .find_category_by_slug(slug)
        .await?
        .map(|c| c.id)
        .with_context(|| format!("unknown category '{slug}'"))
}

pub async fn sync(store: &SqliteStore, config: &Config, user: &UserId, today: NaiveDate) -> Result<String> {
    let client = PlaidClient::new(config.provider.environment, config.provider.credentials());
    if !client.is_configured() {
        warn!("Plaid credentials missing; linked accounts will report errors");
    }
    let provider = Paginated::new(client, config.provider.page_size);
    sync_with(store, &provider, config.sync.clone(), user, today).await
}

pub async fn sync_with<P>(
    store: &SqliteStore,
    provider: &P,
    options: SyncOptions,
    user: &UserId,
    today: NaiveDate,
) -> Result<String>
where
    P: TransactionProvider + ?Sized,
{
    let report = Reconciler::new(store, provider, options)
        .sync_as_of(user, today)
        .await?;
    info!(user = %user, synced = report.synced, errors = report.errors.len(), "sync finished");
    to_json(&report)
}

pub async fn import(store: &SqliteStore, config: &Config, user: &UserId, file: &Path) -> Result<String> {
    let data = std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let report = tally_sync::import_csv(store, user, &data, &config.sync.default_currency).await?;
    to_json(&report)
}

pub async fn export(
    store: &SqliteStore,
    user: &UserId,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<String> {
    let default = tally_sync::default_export_range(today);
    let range = DateRange::new(from.unwrap_or(default.start), to.unwrap_or(default.end));
    Ok(tally_sync::export_transactions(store, user, range).await?)
}

pub async fn budgets(store: &SqliteStore, user: &UserId, today: NaiveDate) -> Result<String> {
    let progress = tally_sync::budget_progress(store, user, today).await?;
    to_json(&progress)
}

pub struct BudgetArgs<'a> {
    pub category: &'a str,
    pub amount: Decimal,
    pub period: &'a str,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

pub async fn add_budget(store: &SqliteStore, user: &UserId, args: BudgetArgs<'_>, today: NaiveDate) -> Result<String> {
    let category_id = category_by_slug(store, args.category).await?;
    let budget = tally_sync::new_budget(
        store,
        user,
        BudgetInput {
            category_id: Some(category_id),
            amount: Some(Money::from_decimal(args.amount)),
            period: args.period.to_string(),
            start_date: args.start,
            end_date: args.end,
        },
        today,
    )
    .await?;
    to_json(&budget)
}

pub async fn add_rule(
    store: &SqliteStore,
    user: &UserId,
    category: &str,
    match_type: &str,
    value: &str,
    priority: Option<i32>,
) -> Result<String> {
    let category_id = category_by_slug(store, category).await?;
    let rule = tally_sync::new_rule(
        store,
        user,
        RuleInput {
            category_id: Some(category_id),
            match_type: match_type.to_string(),
            match_value: value.to_string(),
            priority,
        },
    )
    .await?;
    to_json(&rule)
}

/// `None` clears the category; either way the transaction is marked overridden.
pub async fn set_category(
    store: &SqliteStore,
    user: &UserId,
    transaction: i64,
    category: Option<&str>,
) -> Result<String> {
    let category_id = match category {
        Some(slug) => Some(category_by_slug(store, slug).await?),
        None => None,
    };
    let tx = tally_sync::override_category(store, user, TransactionId(transaction), category_id).await?;
    to_json(&tx)
}

pub async fn add_transaction(
    store: &SqliteStore,
    config: &Config,
    user: &UserId,
    date: NaiveDate,
    name: &str,
    amount: Decimal,
    category: Option<&str>,
) -> Result<String> {
    let category_id = match category {
        Some(slug) => Some(category_by_slug(store, slug).await?),
        None => None,
    };
    let tx = tally_sync::add_manual_transaction(
        store,
        user,
        ManualEntry {
            date,
            name: name.to_string(),
            amount: Money::from_decimal(amount),
            category_id,
        },
        &config.sync.default_currency,
    )
    .await?;
    to_json(&tx)
}

pub struct LinkArgs<'a> {
    pub access_token: &'a str,
    pub item_id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub institution: Option<&'a str>,
}

/// Records an account whose access token was obtained elsewhere.
pub async fn link(store: &SqliteStore, user: &UserId, args: LinkArgs<'_>) -> Result<String> {
    let account: LinkedAccount = store
        .insert_linked_account(NewLinkedAccount {
            user_id: user.clone(),
            provider: Provider::Plaid,
            provider_item_id: args.item_id.map(str::to_string),
            access_token: args.access_token.to_string(),
            account_name: args.name.map(str::to_string),
            institution_name: args.institution.map(str::to_string),
        })
        .await?;
    to_json(&account)
}
