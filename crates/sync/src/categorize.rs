//! Category decision for a single transaction.
//!
//! The decision is an ordered chain of strategies: user rules, then the
//! default keyword table, then the income heuristic. The first strategy that
//! returns a category wins. The chain itself is pure; [`Categorizer`] only
//! loads what the chain needs from the store.

use tally_core::{CategoryId, Money, StoreError, UserId, INCOME_SLUG};
use tracing::debug;

use crate::keywords::{keyword_slugs, KeywordTable};
use crate::rules::{search_text, RuleMatcher};
use crate::store::CategoryStore;

#[derive(Debug, Clone, Copy)]
pub struct CategorizationInput<'a> {
    /// Normalised with [`search_text`].
    pub search_text: &'a str,
    pub amount: Money,
}

pub trait CategoryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide(&self, input: &CategorizationInput<'_>) -> Option<CategoryId>;
}

/// Inflows with no better signal go to the income category, when one exists.
pub struct IncomeHeuristic {
    income: Option<CategoryId>,
}

impl IncomeHeuristic {
    pub fn new(income: Option<CategoryId>) -> Self {
        Self { income }
    }
}

impl CategoryStrategy for IncomeHeuristic {
    fn name(&self) -> &'static str {
        "income"
    }

    fn decide(&self, input: &CategorizationInput<'_>) -> Option<CategoryId> {
        if input.amount.is_inflow() {
            self.income
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct StrategyChain {
    strategies: Vec<Box<dyn CategoryStrategy>>,
}

impl StrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, strategy: impl CategoryStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// The first decisive strategy's name and category.
    pub fn decide(&self, input: &CategorizationInput<'_>) -> Option<(&'static str, CategoryId)> {
        if input.search_text.is_empty() {
            return None;
        }
        self.strategies
            .iter()
            .find_map(|s| s.decide(input).map(|id| (s.name(), id)))
    }
}

pub struct Categorizer<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: CategoryStore + ?Sized> Categorizer<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Returns `Ok(None)` for an uncategorized transaction. Only store lookup
    /// failures are errors, and they are not retried here.
    pub async fn categorize(
        &self,
        user: &UserId,
        merchant_name: Option<&str>,
        name: &str,
        amount: Money,
    ) -> Result<Option<CategoryId>, StoreError> {
        let text = search_text(merchant_name, name);
        if text.is_empty() {
            return Ok(None);
        }

        let chain = self.load_chain(user, amount).await?;
        let input = CategorizationInput {
            search_text: &text,
            amount,
        };
        let decision = chain.decide(&input);
        debug!(
            search_text = %text,
            strategy = decision.map(|(name, _)| name).unwrap_or("none"),
            "categorized"
        );
        Ok(decision.map(|(_, id)| id))
    }

    async fn load_chain(&self, user: &UserId, amount: Money) -> Result<StrategyChain, StoreError> {
        let rules = self.store.find_rules_for_user(user).await?;
        let keyword_categories = self
            .store
            .find_categories_by_slugs(&keyword_slugs())
            .await?;
        // Only inflows can reach the income step.
        let income = if amount.is_inflow() {
            self.store
                .find_category_by_slug(INCOME_SLUG)
                .await?
                .map(|c| c.id)
        } else {
            None
        };

        Ok(StrategyChain::new()
            .then(RuleMatcher::new(rules))
            .then(KeywordTable::new(&keyword_categories))
            .then(IncomeHeuristic::new(income)))
    }
}
