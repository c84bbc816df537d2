//! In-memory store and scripted provider shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tally_core::{
    Budget, BudgetId, Category, CategoryId, CategoryKind, CategoryRule, DateRange, LinkedAccount,
    LinkedAccountId, MatchType, Money, NewBudget, NewCategoryRule, NewLinkedAccount, Provider,
    RemoteTransaction, RuleId, StoreError, Transaction, TransactionId, TransactionListing, UserId,
    DEFAULT_CATEGORIES,
};

use crate::provider::{ProviderError, TransactionProvider};
use crate::store::{AccountStore, BudgetStore, CategoryStore, TransactionStore};

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    rules: Vec<CategoryRule>,
    accounts: Vec<LinkedAccount>,
    transactions: Vec<Transaction>,
    budgets: Vec<Budget>,
    next_id: i64,
    fail_category_reads: bool,
    fail_writes_for: HashSet<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owns(&self, user: &UserId, account: LinkedAccountId) -> bool {
        self.accounts
            .iter()
            .any(|a| a.id == account && &a.user_id == user)
    }

    fn check_category_reads(&self) -> Result<(), StoreError> {
        if self.fail_category_reads {
            Err(StoreError::Unavailable("category table offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn add_category(&self, name: &str, slug: &str, kind: CategoryKind) -> CategoryId {
        let mut s = self.state.lock().unwrap();
        let id = CategoryId(s.next_id());
        s.categories.push(Category {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            kind,
        });
        id
    }

    pub fn add_rule(
        &self,
        user: &UserId,
        category_id: CategoryId,
        match_type: MatchType,
        match_value: &str,
        priority: i32,
    ) {
        let mut s = self.state.lock().unwrap();
        let id = RuleId(s.next_id());
        s.rules.push(CategoryRule {
            id,
            user_id: user.clone(),
            category_id,
            match_type,
            match_value: match_value.to_string(),
            priority,
        });
    }

    pub fn add_account(
        &self,
        user: &UserId,
        provider: Provider,
        token: &str,
        name: Option<&str>,
    ) -> LinkedAccount {
        let mut s = self.state.lock().unwrap();
        let account = LinkedAccount {
            id: LinkedAccountId(s.next_id()),
            user_id: user.clone(),
            provider,
            provider_item_id: None,
            access_token: token.to_string(),
            account_name: name.map(str::to_string),
            institution_name: None,
        };
        s.accounts.push(account.clone());
        account
    }

    pub fn fail_category_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_category_reads = fail;
    }

    pub fn fail_writes_for(&self, provider_tx_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_writes_for
            .insert(provider_tx_id.to_string());
    }

    pub fn transaction(&self, provider_tx_id: &str) -> Option<Transaction> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.provider_tx_id == provider_tx_id)
            .cloned()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn accounts(&self) -> Vec<LinkedAccount> {
        self.state.lock().unwrap().accounts.clone()
    }

    /// Replaces a stored row wholesale, as a direct edit would.
    pub fn put(&self, tx: Transaction) {
        let mut s = self.state.lock().unwrap();
        s.transactions.retain(|t| t.provider_tx_id != tx.provider_tx_id);
        s.transactions.push(tx);
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn find_rules_for_user(&self, user: &UserId) -> Result<Vec<CategoryRule>, StoreError> {
        let s = self.state.lock().unwrap();
        s.check_category_reads()?;
        let mut rules: Vec<CategoryRule> = s
            .rules
            .iter()
            .filter(|r| &r.user_id == user)
            .cloned()
            .collect();
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.match_value.to_uppercase().cmp(&b.match_value.to_uppercase()))
        });
        Ok(rules)
    }

    async fn find_categories_by_slugs(&self, slugs: &[&str]) -> Result<Vec<Category>, StoreError> {
        let s = self.state.lock().unwrap();
        s.check_category_reads()?;
        Ok(s.categories
            .iter()
            .filter(|c| slugs.contains(&c.slug.as_str()))
            .cloned()
            .collect())
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let s = self.state.lock().unwrap();
        s.check_category_reads()?;
        Ok(s.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let s = self.state.lock().unwrap();
        s.check_category_reads()?;
        Ok(s.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_rule(&self, rule: NewCategoryRule) -> Result<CategoryRule, StoreError> {
        let mut s = self.state.lock().unwrap();
        let stored = CategoryRule {
            id: RuleId(s.next_id()),
            user_id: rule.user_id,
            category_id: rule.category_id,
            match_type: rule.match_type,
            match_value: rule.match_value,
            priority: rule.priority,
        };
        s.rules.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn find_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transaction(provider_tx_id))
    }

    async fn upsert(&self, tx: &Transaction) -> Result<Transaction, StoreError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_writes_for.contains(&tx.provider_tx_id) {
            return Err(StoreError::Persistence(format!("rejected {}", tx.provider_tx_id)));
        }
        if let Some(existing) = s
            .transactions
            .iter_mut()
            .find(|t| t.provider_tx_id == tx.provider_tx_id)
        {
            existing.date = tx.date;
            existing.name = tx.name.clone();
            existing.merchant_name = tx.merchant_name.clone();
            existing.amount = tx.amount;
            existing.pending = tx.pending;
            // A stored override survives any write that is not itself an override.
            if !existing.category_override || tx.category_override {
                existing.category_id = tx.category_id;
            }
            existing.category_override |= tx.category_override;
            return Ok(existing.clone());
        }
        let mut stored = tx.clone();
        stored.id = Some(TransactionId(s.next_id()));
        s.transactions.push(stored.clone());
        Ok(stored)
    }

    async fn find_for_user(
        &self,
        user: &UserId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let s = self.state.lock().unwrap();
        Ok(s.transactions
            .iter()
            .find(|t| t.id == Some(id) && s.owns(user, t.linked_account_id))
            .cloned())
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        range: DateRange,
    ) -> Result<Vec<TransactionListing>, StoreError> {
        let s = self.state.lock().unwrap();
        let mut listed: Vec<TransactionListing> = s
            .transactions
            .iter()
            .filter(|t| range.contains(t.date) && s.owns(user, t.linked_account_id))
            .map(|t| TransactionListing {
                transaction: t.clone(),
                account_label: s
                    .accounts
                    .iter()
                    .find(|a| a.id == t.linked_account_id)
                    .and_then(|a| a.account_name.clone().or_else(|| a.institution_name.clone()))
                    .unwrap_or_default(),
                category_name: t.category_id.and_then(|id| {
                    s.categories
                        .iter()
                        .find(|c| c.id == id)
                        .map(|c| c.name.clone())
                }),
            })
            .collect();
        listed.sort_by_key(|l| l.transaction.date);
        Ok(listed)
    }

    async fn outflow_total(
        &self,
        user: &UserId,
        category: CategoryId,
        range: DateRange,
    ) -> Result<Money, StoreError> {
        let s = self.state.lock().unwrap();
        Ok(s.transactions
            .iter()
            .filter(|t| {
                t.category_id == Some(category)
                    && t.amount.is_outflow()
                    && range.contains(t.date)
                    && s.owns(user, t.linked_account_id)
            })
            .map(|t| t.amount)
            .sum())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn linked_accounts(&self, user: &UserId) -> Result<Vec<LinkedAccount>, StoreError> {
        let s = self.state.lock().unwrap();
        Ok(s.accounts
            .iter()
            .filter(|a| &a.user_id == user)
            .cloned()
            .collect())
    }

    async fn find_manual_account(&self, user: &UserId) -> Result<Option<LinkedAccount>, StoreError> {
        let s = self.state.lock().unwrap();
        Ok(s.accounts
            .iter()
            .find(|a| &a.user_id == user && a.provider == Provider::Manual)
            .cloned())
    }

    async fn insert_linked_account(
        &self,
        account: NewLinkedAccount,
    ) -> Result<LinkedAccount, StoreError> {
        let mut s = self.state.lock().unwrap();
        let stored = LinkedAccount {
            id: LinkedAccountId(s.next_id()),
            user_id: account.user_id,
            provider: account.provider,
            provider_item_id: account.provider_item_id,
            access_token: account.access_token,
            account_name: account.account_name,
            institution_name: account.institution_name,
        };
        s.accounts.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl BudgetStore for MemoryStore {
    async fn insert_budget(&self, budget: NewBudget) -> Result<Budget, StoreError> {
        let mut s = self.state.lock().unwrap();
        let stored = Budget {
            id: BudgetId(s.next_id()),
            user_id: budget.user_id,
            category_id: budget.category_id,
            amount: budget.amount,
            period: budget.period,
            start_date: budget.start_date,
            end_date: budget.end_date,
        };
        s.budgets.push(stored.clone());
        Ok(stored)
    }

    async fn budgets_for_user(&self, user: &UserId) -> Result<Vec<Budget>, StoreError> {
        let s = self.state.lock().unwrap();
        Ok(s.budgets
            .iter()
            .filter(|b| &b.user_id == user)
            .cloned()
            .collect())
    }
}

/// A store seeded with the default categories and one user.
pub struct StoreFixture {
    pub store: MemoryStore,
    pub user: UserId,
}

impl StoreFixture {
    pub fn with_defaults() -> Self {
        let store = MemoryStore::default();
        for (name, slug, kind) in DEFAULT_CATEGORIES {
            store.add_category(name, slug, *kind);
        }
        Self {
            store,
            user: UserId::new("user-1"),
        }
    }

    pub fn category(&self, slug: &str) -> CategoryId {
        self.store
            .state
            .lock()
            .unwrap()
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| c.id)
            .unwrap_or_else(|| panic!("no category {slug}"))
    }
}

/// Settled outflow or inflow dated 2024-01-15.
pub fn remote(id: &str, name: &str, cents: i64) -> RemoteTransaction {
    RemoteTransaction {
        provider_tx_id: id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        name: Some(name.to_string()),
        merchant_name: None,
        amount: Money::from_cents(cents),
        currency: None,
        pending: Some(false),
    }
}

type Call = (String, NaiveDate, NaiveDate);

/// Answers per credential; unknown credentials get an empty list.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<HashMap<String, Result<Vec<RemoteTransaction>, ProviderError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn with(self, credential: &str, records: Vec<RemoteTransaction>) -> Self {
        self.set(credential, records);
        self
    }

    pub fn failing(self, credential: &str, error: ProviderError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(credential.to_string(), Err(error));
        self
    }

    pub fn set(&self, credential: &str, records: Vec<RemoteTransaction>) {
        self.responses
            .lock()
            .unwrap()
            .insert(credential.to_string(), Ok(records));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionProvider for ScriptedProvider {
    async fn fetch_transactions(
        &self,
        credential: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RemoteTransaction>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((credential.to_string(), start, end));
        self.responses
            .lock()
            .unwrap()
            .get(credential)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
