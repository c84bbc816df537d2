//! SQLite-backed implementation of the sync store traits.
//!
//! Read failures surface as [`StoreError::Unavailable`] and write failures as
//! [`StoreError::Persistence`], which is the split the reconciler relies on.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};
use tally_core::{
    Budget, BudgetId, BudgetPeriod, Category, CategoryId, CategoryKind, CategoryRule, DateRange,
    LinkedAccount, LinkedAccountId, MatchType, Money, NewBudget, NewCategoryRule,
    NewLinkedAccount, Provider, RuleId, StoreError, Transaction, TransactionId,
    TransactionListing, UserId,
};
use tally_sync::{AccountStore, BudgetStore, CategoryStore, TransactionStore};

use crate::db::DbPool;

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn read_failed(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn write_failed(e: sqlx::Error) -> StoreError {
    StoreError::Persistence(e.to_string())
}

fn cents(amount: Money) -> Result<i64, StoreError> {
    amount
        .to_cents()
        .ok_or_else(|| StoreError::Persistence(format!("Amount out of range: {amount}")))
}

type CategoryRow = (i64, String, String, String);

fn category_from_row(r: CategoryRow) -> Category {
    Category {
        id: CategoryId(r.0),
        name: r.1,
        slug: r.2,
        kind: r.3.parse().unwrap_or(CategoryKind::Expense),
    }
}

type RuleRow = (i64, String, i64, String, String, i32);

fn rule_from_row(r: RuleRow) -> CategoryRule {
    CategoryRule {
        id: RuleId(r.0),
        user_id: UserId(r.1),
        category_id: CategoryId(r.2),
        match_type: MatchType::parse_lenient(&r.3),
        match_value: r.4,
        priority: r.5,
    }
}

type AccountRow = (i64, String, String, Option<String>, String, Option<String>, Option<String>);

fn account_from_row(r: AccountRow) -> LinkedAccount {
    LinkedAccount {
        id: LinkedAccountId(r.0),
        user_id: UserId(r.1),
        // Only `manual` rows are skipped by sync; anything else is a remote link.
        provider: r.2.parse().unwrap_or(Provider::Plaid),
        provider_item_id: r.3,
        access_token: r.4,
        account_name: r.5,
        institution_name: r.6,
    }
}

type BudgetRow = (i64, String, i64, i64, String, NaiveDate, Option<NaiveDate>);

fn budget_from_row(r: BudgetRow) -> Budget {
    Budget {
        id: BudgetId(r.0),
        user_id: UserId(r.1),
        category_id: CategoryId(r.2),
        amount: Money::from_cents(r.3),
        period: BudgetPeriod::parse_lenient(&r.4),
        start_date: r.5,
        end_date: r.6,
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    linked_account_id: i64,
    provider_tx_id: String,
    date: NaiveDate,
    name: String,
    merchant_name: Option<String>,
    amount_cents: i64,
    currency: String,
    category_id: Option<i64>,
    category_override: bool,
    pending: bool,
}

impl From<TransactionRow> for Transaction {
    fn from(r: TransactionRow) -> Self {
        Transaction {
            id: Some(TransactionId(r.id)),
            linked_account_id: LinkedAccountId(r.linked_account_id),
            provider_tx_id: r.provider_tx_id,
            date: r.date,
            name: r.name,
            merchant_name: r.merchant_name,
            amount: Money::from_cents(r.amount_cents),
            currency: r.currency,
            category_id: r.category_id.map(CategoryId),
            category_override: r.category_override,
            pending: r.pending,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    account_label: String,
    category_name: Option<String>,
}

const TRANSACTION_COLUMNS: &str = "t.id, t.linked_account_id, t.provider_tx_id, t.date, t.name, \
     t.merchant_name, t.amount_cents, t.currency, t.category_id, t.category_override, t.pending";

#[async_trait]
impl CategoryStore for SqliteStore {
    async fn find_rules_for_user(&self, user: &UserId) -> Result<Vec<CategoryRule>, StoreError> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, user_id, category_id, match_type, match_value, priority FROM category_rules \
             WHERE user_id = ? ORDER BY priority DESC, UPPER(match_value) ASC, id ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(rows.into_iter().map(rule_from_row).collect())
    }

    async fn find_categories_by_slugs(&self, slugs: &[&str]) -> Result<Vec<Category>, StoreError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, slug, kind FROM categories WHERE slug IN (");
        let mut separated = query.separated(", ");
        for slug in slugs {
            separated.push_bind(*slug);
        }
        separated.push_unseparated(")");

        let rows = query
            .build_query_as::<CategoryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(read_failed)?;
        Ok(rows.into_iter().map(category_from_row).collect())
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, kind FROM categories WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(row.map(category_from_row))
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, kind FROM categories WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(row.map(category_from_row))
    }

    async fn insert_rule(&self, rule: NewCategoryRule) -> Result<CategoryRule, StoreError> {
        let result = sqlx::query(
            "INSERT INTO category_rules (user_id, category_id, match_type, match_value, priority) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(rule.user_id.as_str())
        .bind(rule.category_id.0)
        .bind(rule.match_type.as_str())
        .bind(&rule.match_value)
        .bind(rule.priority)
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;

        Ok(CategoryRule {
            id: RuleId(result.last_insert_rowid()),
            user_id: rule.user_id,
            category_id: rule.category_id,
            match_type: rule.match_type,
            match_value: rule.match_value,
            priority: rule.priority,
        })
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn find_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t WHERE t.provider_tx_id = ?"
        ))
        .bind(provider_tx_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(row.map(Transaction::from))
    }

    async fn upsert(&self, tx: &Transaction) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                linked_account_id, provider_tx_id, date, name, merchant_name,
                amount_cents, currency, category_id, category_override, pending
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(provider_tx_id) DO UPDATE SET
                date = excluded.date,
                name = excluded.name,
                merchant_name = excluded.merchant_name,
                amount_cents = excluded.amount_cents,
                category_id = CASE
                    WHEN transactions.category_override AND NOT excluded.category_override
                    THEN transactions.category_id
                    ELSE excluded.category_id
                END,
                category_override = MAX(transactions.category_override, excluded.category_override),
                pending = excluded.pending
            RETURNING id, linked_account_id, provider_tx_id, date, name, merchant_name,
                amount_cents, currency, category_id, category_override, pending
            "#,
        )
        .bind(tx.linked_account_id.0)
        .bind(&tx.provider_tx_id)
        .bind(tx.date)
        .bind(&tx.name)
        .bind(&tx.merchant_name)
        .bind(cents(tx.amount)?)
        .bind(&tx.currency)
        .bind(tx.category_id.map(|c| c.0))
        .bind(tx.category_override)
        .bind(tx.pending)
        .fetch_one(&self.pool)
        .await
        .map_err(write_failed)?;

        Ok(row.into())
    }

    async fn find_for_user(
        &self,
        user: &UserId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t \
             JOIN linked_accounts a ON a.id = t.linked_account_id \
             WHERE t.id = ? AND a.user_id = ?"
        ))
        .bind(id.0)
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(row.map(Transaction::from))
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        range: DateRange,
    ) -> Result<Vec<TransactionListing>, StoreError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS}, \
                COALESCE(a.account_name, a.institution_name, '') AS account_label, \
                c.name AS category_name \
             FROM transactions t \
             JOIN linked_accounts a ON a.id = t.linked_account_id \
             LEFT JOIN categories c ON c.id = t.category_id \
             WHERE a.user_id = ? AND t.date >= ? AND t.date <= ? \
             ORDER BY t.date ASC, t.id ASC"
        ))
        .bind(user.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(rows
            .into_iter()
            .map(|r| TransactionListing {
                transaction: r.transaction.into(),
                account_label: r.account_label,
                category_name: r.category_name,
            })
            .collect())
    }

    async fn outflow_total(
        &self,
        user: &UserId,
        category: CategoryId,
        range: DateRange,
    ) -> Result<Money, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(t.amount_cents), 0) FROM transactions t \
             JOIN linked_accounts a ON a.id = t.linked_account_id \
             WHERE a.user_id = ? AND t.category_id = ? AND t.amount_cents < 0 \
               AND t.date >= ? AND t.date <= ?",
        )
        .bind(user.as_str())
        .bind(category.0)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(Money::from_cents(total))
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn linked_accounts(&self, user: &UserId) -> Result<Vec<LinkedAccount>, StoreError> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, user_id, provider, provider_item_id, access_token, account_name, institution_name \
             FROM linked_accounts WHERE user_id = ? ORDER BY id",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }

    async fn find_manual_account(&self, user: &UserId) -> Result<Option<LinkedAccount>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, user_id, provider, provider_item_id, access_token, account_name, institution_name \
             FROM linked_accounts WHERE user_id = ? AND provider = 'manual' ORDER BY id LIMIT 1",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(row.map(account_from_row))
    }

    async fn insert_linked_account(
        &self,
        account: NewLinkedAccount,
    ) -> Result<LinkedAccount, StoreError> {
        let result = sqlx::query(
            "INSERT INTO linked_accounts \
             (user_id, provider, provider_item_id, access_token, account_name, institution_name) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(account.user_id.as_str())
        .bind(account.provider.to_string())
        .bind(&account.provider_item_id)
        .bind(&account.access_token)
        .bind(&account.account_name)
        .bind(&account.institution_name)
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;

        Ok(LinkedAccount {
            id: LinkedAccountId(result.last_insert_rowid()),
            user_id: account.user_id,
            provider: account.provider,
            provider_item_id: account.provider_item_id,
            access_token: account.access_token,
            account_name: account.account_name,
            institution_name: account.institution_name,
        })
    }
}

#[async_trait]
impl BudgetStore for SqliteStore {
    async fn insert_budget(&self, budget: NewBudget) -> Result<Budget, StoreError> {
        let result = sqlx::query(
            "INSERT INTO budgets (user_id, category_id, amount_cents, period, start_date, end_date) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(budget.user_id.as_str())
        .bind(budget.category_id.0)
        .bind(cents(budget.amount)?)
        .bind(budget.period.to_string())
        .bind(budget.start_date)
        .bind(budget.end_date)
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;

        Ok(Budget {
            id: BudgetId(result.last_insert_rowid()),
            user_id: budget.user_id,
            category_id: budget.category_id,
            amount: budget.amount,
            period: budget.period,
            start_date: budget.start_date,
            end_date: budget.end_date,
        })
    }

    async fn budgets_for_user(&self, user: &UserId) -> Result<Vec<Budget>, StoreError> {
        let rows = sqlx::query_as::<_, BudgetRow>(
            "SELECT id, user_id, category_id, amount_cents, period, start_date, end_date \
             FROM budgets WHERE user_id = ? ORDER BY id",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        Ok(rows.into_iter().map(budget_from_row).collect())
    }
}
