use async_trait::async_trait;
use chrono::NaiveDate;
use tally_core::{DateRange, RemoteTransaction};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Bank linking is not configured")]
    NotConfigured,
    #[error("Could not fetch transactions: {0}")]
    Http(String),
    #[error("Could not fetch transactions: {code}: {message}")]
    Api { code: String, message: String },
    #[error("Could not read provider response: {0}")]
    Decode(String),
}

/// Abstraction over a bank aggregator.
/// Implementations return every record dated within `[start, end]`.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn fetch_transactions(
        &self,
        credential: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RemoteTransaction>, ProviderError>;
}

/// One offset/count page of an aggregator's transaction listing.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        credential: &str,
        range: DateRange,
        offset: usize,
        count: usize,
    ) -> Result<Vec<RemoteTransaction>, ProviderError>;
}

/// Walks a [`PageSource`] until a page comes back shorter than `page_size`.
pub struct Paginated<S> {
    source: S,
    page_size: usize,
}

pub const DEFAULT_PAGE_SIZE: usize = 500;

impl<S: PageSource> Paginated<S> {
    pub fn new(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: PageSource> TransactionProvider for Paginated<S> {
    async fn fetch_transactions(
        &self,
        credential: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RemoteTransaction>, ProviderError> {
        let range = DateRange::new(start, end);
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .source
                .fetch_page(credential, range, offset, self.page_size)
                .await?;
            let len = page.len();
            all.extend(page);
            debug!(offset, len, "fetched transaction page");
            if len < self.page_size {
                break;
            }
            offset += self.page_size;
        }
        Ok(all)
    }
}
