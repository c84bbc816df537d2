//! Merges aggregator records into the local store.
//!
//! Accounts and records are processed one at a time: categorization reads the
//! current store state, so a later write must never race an earlier one for
//! the same provider id. Each write stands alone; an interrupted run leaves
//! the records already written in place.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{
    CategoryId, DateRange, LinkedAccount, RemoteTransaction, StoreError, SyncReport, Transaction,
    UserId,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::categorize::Categorizer;
use crate::provider::TransactionProvider;
use crate::store::{AccountStore, CategoryStore, TransactionStore};

#[derive(Debug, Error)]
pub enum SyncError {
    /// Categorization (or the account listing) could not read the store.
    /// Writing without a trustworthy category is unsafe, so the run stops.
    #[error("Store unavailable during sync: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Days of history fetched on every run, ending today.
    pub window_days: u64,
    /// Currency stored when the aggregator omits one.
    pub default_currency: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            window_days: 90,
            default_currency: "CAD".to_string(),
        }
    }
}

pub struct Reconciler<'a, S: ?Sized, P: ?Sized> {
    store: &'a S,
    provider: &'a P,
    options: SyncOptions,
}

impl<'a, S, P> Reconciler<'a, S, P>
where
    S: CategoryStore + TransactionStore + AccountStore + ?Sized,
    P: TransactionProvider + ?Sized,
{
    pub fn new(store: &'a S, provider: &'a P, options: SyncOptions) -> Self {
        Self {
            store,
            provider,
            options,
        }
    }

    pub async fn sync_transactions(&self, user: &UserId) -> Result<SyncReport, SyncError> {
        self.sync_as_of(user, Utc::now().date_naive()).await
    }

    /// Syncs the window ending on `today`.
    pub async fn sync_as_of(&self, user: &UserId, today: NaiveDate) -> Result<SyncReport, SyncError> {
        let window = DateRange::trailing(today, self.options.window_days);
        let accounts = self.store.linked_accounts(user).await?;
        let categorizer = Categorizer::new(self.store);
        let mut report = SyncReport::default();

        for account in accounts.iter().filter(|a| a.is_syncable()) {
            info!(user = %user, account = %account.id, %window, "syncing account");
            let records = match self
                .provider
                .fetch_transactions(&account.access_token, window.start, window.end)
                .await
            {
                Ok(records) => records,
                Err(e) => {
                    warn!(account = %account.id, error = %e, "provider fetch failed");
                    report.errors.push(format!("{}: {e}", account.label()));
                    continue;
                }
            };

            let before = report.synced;
            for record in &records {
                let category = if record.is_pending() {
                    None
                } else {
                    categorizer
                        .categorize(
                            user,
                            record.merchant_name.as_deref(),
                            record.name_or_empty(),
                            record.amount,
                        )
                        .await?
                };

                match self.write_record(account, record, category).await {
                    Ok(()) => report.synced += 1,
                    Err(e) => {
                        warn!(provider_tx_id = %record.provider_tx_id, error = %e, "record write failed");
                        report.errors.push(format!("Tx {}: {e}", record.provider_tx_id));
                    }
                }
            }
            info!(
                account = %account.id,
                fetched = records.len(),
                written = report.synced - before,
                "account synced"
            );
        }

        Ok(report)
    }

    async fn write_record(
        &self,
        account: &LinkedAccount,
        record: &RemoteTransaction,
        category: Option<CategoryId>,
    ) -> Result<(), StoreError> {
        let merged = match self.store.find_by_provider_id(&record.provider_tx_id).await? {
            Some(existing) => merge_into(existing, record, category),
            None => new_from_remote(account, record, category, &self.options.default_currency),
        };
        debug!(
            provider_tx_id = %merged.provider_tx_id,
            category = ?merged.category_id,
            overridden = merged.category_override,
            "upserting"
        );
        self.store.upsert(&merged).await?;
        Ok(())
    }
}

fn new_from_remote(
    account: &LinkedAccount,
    record: &RemoteTransaction,
    category: Option<CategoryId>,
    default_currency: &str,
) -> Transaction {
    Transaction {
        id: None,
        linked_account_id: account.id,
        provider_tx_id: record.provider_tx_id.clone(),
        date: record.date,
        name: record.name_or_empty().to_string(),
        merchant_name: record.merchant_name.clone(),
        amount: record.amount,
        currency: record
            .currency
            .clone()
            .unwrap_or_else(|| default_currency.to_string()),
        category_id: category,
        category_override: false,
        pending: record.pending.unwrap_or(false),
    }
}

/// Provider fields always follow the remote record; the category only does
/// while nobody has overridden it.
fn merge_into(
    mut existing: Transaction,
    record: &RemoteTransaction,
    category: Option<CategoryId>,
) -> Transaction {
    existing.date = record.date;
    existing.name = record.name_or_empty().to_string();
    existing.merchant_name = record.merchant_name.clone();
    existing.amount = record.amount;
    existing.pending = record.pending.unwrap_or(false);
    if !existing.category_override {
        existing.category_id = category;
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::testing::{remote, ScriptedProvider, StoreFixture};
    use tally_core::{MatchType, Money, Provider};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    fn reconciler<'a>(
        fx: &'a StoreFixture,
        provider: &'a ScriptedProvider,
    ) -> Reconciler<'a, crate::testing::MemoryStore, ScriptedProvider> {
        Reconciler::new(&fx.store, provider, SyncOptions::default())
    }

    #[tokio::test]
    async fn inserts_new_records_with_categories() {
        let fx = StoreFixture::with_defaults();
        let account = fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", Some("Chequing"));
        let provider = ScriptedProvider::default().with(
            "tok-1",
            vec![
                remote("a", "COSTCO WHOLESALE #443", -12_000),
                remote("b", "ACME CORP PAYROLL", 150_000),
            ],
        );

        let report = reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(report, SyncReport { synced: 2, errors: vec![] });
        let a = fx.store.transaction("a").unwrap();
        assert_eq!(a.category_id, Some(fx.category("groceries")));
        assert_eq!(a.linked_account_id, account.id);
        assert_eq!(a.currency, "CAD");
        assert!(!a.category_override);
        assert_eq!(fx.store.transaction("b").unwrap().category_id, Some(fx.category("income")));
    }

    #[tokio::test]
    async fn fetches_the_trailing_window() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let provider = ScriptedProvider::default().with("tok-1", vec![]);

        reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(calls[0].2, today());
    }

    #[tokio::test]
    async fn resync_is_idempotent() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let provider = ScriptedProvider::default().with(
            "tok-1",
            vec![remote("a", "COSTCO", -12_000), remote("b", "STARBUCKS", -550)],
        );
        let r = reconciler(&fx, &provider);

        let first = r.sync_as_of(&fx.user, today()).await.unwrap();
        let snapshot = fx.store.transactions();
        let second = r.sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(first.synced + second.synced, 4);
        assert_eq!(fx.store.transactions(), snapshot);
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn override_survives_resync() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let provider =
            ScriptedProvider::default().with("tok-1", vec![remote("a", "COSTCO WHOLESALE", -12_000)]);
        let r = reconciler(&fx, &provider);
        r.sync_as_of(&fx.user, today()).await.unwrap();

        let mut tx = fx.store.transaction("a").unwrap();
        tx.category_id = Some(fx.category("travel"));
        tx.category_override = true;
        fx.store.put(tx);

        r.sync_as_of(&fx.user, today()).await.unwrap();

        let tx = fx.store.transaction("a").unwrap();
        assert_eq!(tx.category_id, Some(fx.category("travel")));
        assert!(tx.category_override);
    }

    #[tokio::test]
    async fn non_category_fields_update_even_when_overridden() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let mut pending = remote("a", "COSTCO", -12_000);
        pending.pending = Some(true);
        let provider = ScriptedProvider::default().with("tok-1", vec![pending]);
        let r = reconciler(&fx, &provider);
        r.sync_as_of(&fx.user, today()).await.unwrap();

        let mut tx = fx.store.transaction("a").unwrap();
        tx.category_id = Some(fx.category("travel"));
        tx.category_override = true;
        fx.store.put(tx);

        provider.set("tok-1", vec![remote("a", "COSTCO WHOLESALE", -12_345)]);
        r.sync_as_of(&fx.user, today()).await.unwrap();

        let tx = fx.store.transaction("a").unwrap();
        assert_eq!(tx.name, "COSTCO WHOLESALE");
        assert_eq!(tx.amount, Money::from_cents(-12_345));
        assert!(!tx.pending);
        assert_eq!(tx.category_id, Some(fx.category("travel")));
    }

    #[tokio::test]
    async fn pending_is_uncategorized_until_settled() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let mut pending = remote("a", "STARBUCKS 0042", -550);
        pending.pending = Some(true);
        let provider = ScriptedProvider::default().with("tok-1", vec![pending]);
        let r = reconciler(&fx, &provider);

        r.sync_as_of(&fx.user, today()).await.unwrap();
        let tx = fx.store.transaction("a").unwrap();
        assert!(tx.pending);
        assert_eq!(tx.category_id, None);

        provider.set("tok-1", vec![remote("a", "STARBUCKS 0042", -550)]);
        r.sync_as_of(&fx.user, today()).await.unwrap();
        let tx = fx.store.transaction("a").unwrap();
        assert!(!tx.pending);
        assert_eq!(tx.category_id, Some(fx.category("dining")));
    }

    #[tokio::test]
    async fn new_rules_recategorize_on_next_sync() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let provider = ScriptedProvider::default().with("tok-1", vec![remote("a", "COSTCO", -1_000)]);
        let r = reconciler(&fx, &provider);
        r.sync_as_of(&fx.user, today()).await.unwrap();

        fx.store
            .add_rule(&fx.user, fx.category("shopping"), MatchType::Equals, "costco", 1);
        r.sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(
            fx.store.transaction("a").unwrap().category_id,
            Some(fx.category("shopping"))
        );
    }

    #[tokio::test]
    async fn failing_account_does_not_abort_others() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "revoked", Some("Visa"));
        let unnamed = fx.store.add_account(&fx.user, Provider::Plaid, "also-bad", None);
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let provider = ScriptedProvider::default()
            .failing("revoked", ProviderError::Http("401".to_string()))
            .failing("also-bad", ProviderError::NotConfigured)
            .with("tok-1", vec![remote("a", "COSTCO", -1_000)]);

        let report = reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(report.synced, 1);
        assert_eq!(
            report.errors,
            vec![
                "Visa: Could not fetch transactions: 401".to_string(),
                format!("{}: Bank linking is not configured", unnamed.id),
            ]
        );
    }

    #[tokio::test]
    async fn manual_accounts_are_skipped() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Manual, "manual", Some("Manual"));
        let provider = ScriptedProvider::default();

        let report = reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(report, SyncReport::default());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn record_write_failure_is_recorded_and_skipped() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        fx.store.fail_writes_for("b");
        let provider = ScriptedProvider::default().with(
            "tok-1",
            vec![
                remote("a", "COSTCO", -1_000),
                remote("b", "COSTCO", -2_000),
                remote("c", "COSTCO", -3_000),
            ],
        );

        let report = reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(report.synced, 2);
        assert_eq!(report.errors, vec!["Tx b: Write failed: rejected b".to_string()]);
        assert!(fx.store.transaction("b").is_none());
        assert!(fx.store.transaction("c").is_some());
    }

    #[tokio::test]
    async fn categorization_lookup_failure_aborts() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let provider = ScriptedProvider::default().with("tok-1", vec![remote("a", "COSTCO", -1_000)]);
        fx.store.fail_category_reads(true);

        let result = reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await;

        assert!(matches!(result, Err(SyncError::StoreUnavailable(_))));
        assert!(fx.store.transaction("a").is_none());
    }

    #[tokio::test]
    async fn remote_currency_wins_over_default() {
        let fx = StoreFixture::with_defaults();
        fx.store.add_account(&fx.user, Provider::Plaid, "tok-1", None);
        let mut usd = remote("a", "HOTEL", -20_000);
        usd.currency = Some("USD".to_string());
        let provider = ScriptedProvider::default().with("tok-1", vec![usd]);

        reconciler(&fx, &provider).sync_as_of(&fx.user, today()).await.unwrap();

        assert_eq!(fx.store.transaction("a").unwrap().currency, "USD");
    }
}
