use chrono::NaiveDate;
use serde::Deserialize;
use tally_core::{
    Budget, BudgetPeriod, BudgetProgress, CategoryId, DateRange, Money, NewBudget, StoreError,
    UserId,
};
use thiserror::Error;
use tracing::debug;

use crate::store::{BudgetStore, CategoryStore, TransactionStore};

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Budget amount must be positive")]
    NonPositiveAmount,
    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetInput {
    pub category_id: Option<CategoryId>,
    pub amount: Option<Money>,
    #[serde(default)]
    pub period: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Creates a budget. Anything but `weekly` is monthly, and a missing start
/// date means the first of the month containing `today`.
pub async fn new_budget<S>(
    store: &S,
    user: &UserId,
    input: BudgetInput,
    today: NaiveDate,
) -> Result<Budget, BudgetError>
where
    S: BudgetStore + CategoryStore + ?Sized,
{
    let category_id = input.category_id.ok_or(BudgetError::Missing("categoryId"))?;
    let amount = input.amount.ok_or(BudgetError::Missing("amount"))?;
    if !amount.is_inflow() {
        return Err(BudgetError::NonPositiveAmount);
    }
    if store.find_category(category_id).await?.is_none() {
        return Err(BudgetError::CategoryNotFound(category_id));
    }

    let budget = store
        .insert_budget(NewBudget {
            user_id: user.clone(),
            category_id,
            amount,
            period: BudgetPeriod::parse_lenient(&input.period),
            start_date: input
                .start_date
                .unwrap_or_else(|| DateRange::month_of(today).start),
            end_date: input.end_date,
        })
        .await?;
    Ok(budget)
}

/// Spending against every budget the user has, for the period containing
/// `today`. A budget that has not started or has already ended shows zero.
pub async fn budget_progress<S>(
    store: &S,
    user: &UserId,
    today: NaiveDate,
) -> Result<Vec<BudgetProgress>, StoreError>
where
    S: BudgetStore + TransactionStore + ?Sized,
{
    let budgets = store.budgets_for_user(user).await?;
    let mut progress = Vec::with_capacity(budgets.len());
    for budget in budgets {
        let spent = match budget.current_range(today) {
            Some(range) => store
                .outflow_total(user, budget.category_id, range)
                .await?
                .abs(),
            None => Money::zero(),
        };
        debug!(budget = budget.id.0, spent = %spent, "budget progress");
        progress.push(BudgetProgress::new(budget, spent));
    }
    Ok(progress)
}
