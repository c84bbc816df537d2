pub mod budget;
pub mod categorize;
pub mod csv;
pub mod entry;
pub mod keywords;
pub mod plaid;
pub mod provider;
pub mod reconcile;
pub mod rules;
pub mod store;

#[cfg(test)]
mod testing;

pub use budget::{budget_progress, new_budget, BudgetError, BudgetInput};
pub use categorize::{CategorizationInput, Categorizer, CategoryStrategy, IncomeHeuristic, StrategyChain};
pub use csv::{default_export_range, export_csv, export_transactions, import_csv, parse_statement, CsvError};
pub use entry::{add_manual_transaction, manual_account, new_rule, override_category, EntryError, ManualEntry, RuleInput};
pub use keywords::{KeywordTable, DEFAULT_KEYWORDS};
pub use plaid::{PlaidClient, PlaidCredentials, PlaidEnvironment};
pub use provider::{PageSource, Paginated, ProviderError, TransactionProvider, DEFAULT_PAGE_SIZE};
pub use reconcile::{Reconciler, SyncError, SyncOptions};
pub use rules::{search_text, RuleMatcher};
pub use store::{AccountStore, BudgetStore, CategoryStore, TransactionStore};
