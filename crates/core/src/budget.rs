use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::UserId;
use crate::category::CategoryId;
use crate::money::Money;
use crate::period::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
}

impl BudgetPeriod {
    /// `weekly` selects weekly budgets; everything else is monthly.
    pub fn parse_lenient(s: &str) -> Self {
        if s == "weekly" {
            BudgetPeriod::Weekly
        } else {
            BudgetPeriod::Monthly
        }
    }

    pub fn range_containing(self, date: NaiveDate) -> DateRange {
        match self {
            BudgetPeriod::Weekly => DateRange::week_of(date),
            BudgetPeriod::Monthly => DateRange::month_of(date),
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetPeriod::Weekly => write!(f, "weekly"),
            BudgetPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub user_id: UserId,
    pub category_id: CategoryId,
    /// Spending limit per period, as a positive amount.
    pub amount: Money,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl Budget {
    /// The period containing `today`, clipped to the budget's own lifetime.
    pub fn current_range(&self, today: NaiveDate) -> Option<DateRange> {
        self.period
            .range_containing(today)
            .clip(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBudget {
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub amount: Money,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetProgress {
    pub budget: Budget,
    pub spent: Money,
    /// Share of the limit used, capped at 100.
    pub percent: Decimal,
    pub over: bool,
}

impl BudgetProgress {
    pub fn new(budget: Budget, spent: Money) -> Self {
        let limit = budget.amount.amount();
        let percent = if limit > Decimal::ZERO {
            (spent.amount() / limit * Decimal::ONE_HUNDRED)
                .min(Decimal::ONE_HUNDRED)
                .round_dp(2)
        } else {
            Decimal::ZERO
        };
        let over = spent > budget.amount;
        BudgetProgress {
            budget,
            spent,
            percent,
            over,
        }
    }
}
