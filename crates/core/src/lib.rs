pub mod account;
pub mod budget;
pub mod category;
pub mod error;
pub mod money;
pub mod period;
pub mod report;
pub mod rule;
pub mod transaction;

pub use account::{LinkedAccount, LinkedAccountId, NewLinkedAccount, Provider, UserId};
pub use budget::{Budget, BudgetId, BudgetPeriod, BudgetProgress, NewBudget};
pub use category::{Category, CategoryId, CategoryKind, DEFAULT_CATEGORIES, INCOME_SLUG};
pub use error::StoreError;
pub use money::Money;
pub use period::DateRange;
pub use report::{ImportReport, SyncReport};
pub use rule::{CategoryRule, MatchType, NewCategoryRule, RuleId};
pub use transaction::{RemoteTransaction, Transaction, TransactionId, TransactionListing};
