//! Repository seams the engine reads from and writes to.
//!
//! Every method is scoped by user or by the globally unique provider
//! transaction id, so one store can serve concurrent runs for different users.

use async_trait::async_trait;
use tally_core::{
    Budget, Category, CategoryId, CategoryRule, DateRange, LinkedAccount, Money, NewBudget,
    NewCategoryRule, NewLinkedAccount, StoreError, Transaction, TransactionId,
    TransactionListing, UserId,
};

#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Rules ordered by priority descending, then match value ascending.
    async fn find_rules_for_user(&self, user: &UserId) -> Result<Vec<CategoryRule>, StoreError>;

    async fn find_categories_by_slugs(&self, slugs: &[&str]) -> Result<Vec<Category>, StoreError>;

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    async fn insert_rule(&self, rule: NewCategoryRule) -> Result<CategoryRule, StoreError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Inserts, or overwrites the mutable fields of the row sharing
    /// `provider_tx_id`. The owning account and currency of an existing row
    /// are left as they are. Once a row is overridden, only another override
    /// may change its category, whatever `tx` was read from.
    async fn upsert(&self, tx: &Transaction) -> Result<Transaction, StoreError>;

    /// Looks up a transaction only if it belongs to one of `user`'s accounts.
    async fn find_for_user(
        &self,
        user: &UserId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Transactions dated within `range`, oldest first.
    async fn list_for_user(
        &self,
        user: &UserId,
        range: DateRange,
    ) -> Result<Vec<TransactionListing>, StoreError>;

    /// Sum of the negative amounts in `category` within `range`.
    async fn outflow_total(
        &self,
        user: &UserId,
        category: CategoryId,
        range: DateRange,
    ) -> Result<Money, StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn linked_accounts(&self, user: &UserId) -> Result<Vec<LinkedAccount>, StoreError>;

    async fn find_manual_account(&self, user: &UserId) -> Result<Option<LinkedAccount>, StoreError>;

    async fn insert_linked_account(
        &self,
        account: NewLinkedAccount,
    ) -> Result<LinkedAccount, StoreError>;
}

#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn insert_budget(&self, budget: NewBudget) -> Result<Budget, StoreError>;

    async fn budgets_for_user(&self, user: &UserId) -> Result<Vec<Budget>, StoreError>;
}
