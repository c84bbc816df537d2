//! Plaid `/transactions/get` client.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::{DateRange, Money, RemoteTransaction};
use tracing::warn;

use crate::provider::{PageSource, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

impl std::str::FromStr for PlaidEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(PlaidEnvironment::Sandbox),
            "development" => Ok(PlaidEnvironment::Development),
            "production" => Ok(PlaidEnvironment::Production),
            other => Err(format!("Unknown Plaid environment: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaidCredentials {
    pub client_id: Option<String>,
    pub secret: Option<String>,
}

pub struct PlaidClient {
    http: reqwest::Client,
    base_url: String,
    credentials: PlaidCredentials,
}

impl PlaidClient {
    pub fn new(environment: PlaidEnvironment, credentials: PlaidCredentials) -> Self {
        Self::with_base_url(environment.base_url(), credentials)
    }

    pub fn with_base_url(base_url: impl Into<String>, credentials: PlaidCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.keys().is_some()
    }

    fn keys(&self) -> Option<(&str, &str)> {
        let id = self.credentials.client_id.as_deref().filter(|s| !s.is_empty())?;
        let secret = self.credentials.secret.as_deref().filter(|s| !s.is_empty())?;
        Some((id, secret))
    }
}

#[derive(Debug, Serialize)]
struct TransactionsGetRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    start_date: String,
    end_date: String,
    options: PageOptions,
}

#[derive(Debug, Serialize)]
struct PageOptions {
    count: usize,
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct TransactionsGetResponse {
    #[serde(default)]
    transactions: Vec<PlaidTransaction>,
}

#[derive(Debug, Deserialize)]
struct PlaidTransaction {
    transaction_id: String,
    date: NaiveDate,
    name: Option<String>,
    merchant_name: Option<String>,
    amount: f64,
    iso_currency_code: Option<String>,
    pending: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PlaidErrorBody {
    error_code: String,
    error_message: String,
}

impl From<PlaidTransaction> for RemoteTransaction {
    /// Plaid reports money leaving the account as a positive amount; flip it
    /// so outflows are negative.
    fn from(tx: PlaidTransaction) -> Self {
        RemoteTransaction {
            provider_tx_id: tx.transaction_id,
            date: tx.date,
            name: tx.name,
            merchant_name: tx.merchant_name,
            amount: -Money::from_f64(tx.amount),
            currency: tx.iso_currency_code,
            pending: tx.pending,
        }
    }
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl PageSource for PlaidClient {
    async fn fetch_page(
        &self,
        credential: &str,
        range: DateRange,
        offset: usize,
        count: usize,
    ) -> Result<Vec<RemoteTransaction>, ProviderError> {
        let (client_id, secret) = self.keys().ok_or(ProviderError::NotConfigured)?;
        let request = TransactionsGetRequest {
            client_id,
            secret,
            access_token: credential,
            start_date: format_date(range.start),
            end_date: format_date(range.end),
            options: PageOptions { count, offset },
        };

        let response = self
            .http
            .post(format!("{}/transactions/get", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "transactions/get rejected");
            return Err(match serde_json::from_str::<PlaidErrorBody>(&body) {
                Ok(e) => ProviderError::Api {
                    code: e.error_code,
                    message: e.error_message,
                },
                Err(_) => ProviderError::Http(format!("HTTP {status}")),
            });
        }

        let page: TransactionsGetResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(page.transactions.into_iter().map(RemoteTransaction::from).collect())
    }
}
