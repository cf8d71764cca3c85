use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::error::{SourceError, SourceResult};
use super::response::FixerResponse;
use super::RateSource;
use crate::models::{CurrencyCode, RateSnapshot};

/// Fixer.io client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct FixerConfig {
    /// API root, `/latest` is appended (e.g. "http://data.fixer.io/api")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access key sent as the `access_key` query parameter
    pub api_key: String,

    /// Currency every rate is requested against
    #[serde(default = "CurrencyCode::eur")]
    pub base_currency: CurrencyCode,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl FixerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            api_key: api_key.into(),
            base_currency: CurrencyCode::eur(),
            timeout_secs: default_timeout(),
        }
    }

    /// Set API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set base currency
    pub fn with_base_currency(mut self, base_currency: CurrencyCode) -> Self {
        self.base_currency = base_currency;
        self
    }

    /// Set request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

// Keeps the access key out of logs
impl std::fmt::Debug for FixerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("base_currency", &self.base_currency)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_base_url() -> String {
    "http://data.fixer.io/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Fixer.io `/latest` client
pub struct FixerClient {
    client: Client,
    config: FixerConfig,
}

impl FixerClient {
    /// Create a client with its own reqwest client
    pub fn new(config: FixerConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::transport("building HTTP client", e))?;

        Self::with_client(config, client)
    }

    /// Create a client on top of an existing reqwest client
    pub fn with_client(config: FixerConfig, client: Client) -> SourceResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(SourceError::Configuration(
                "'base_url' must not be empty".to_string(),
            ));
        }
        if config.api_key.trim().is_empty() {
            return Err(SourceError::Configuration(
                "'api_key' must not be empty".to_string(),
            ));
        }

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FixerConfig {
        &self.config
    }

    fn latest_url(&self) -> String {
        format!("{}/latest", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch_latest(&self, symbols: Option<String>) -> SourceResult<RateSnapshot> {
        let mut query = vec![
            ("access_key", self.config.api_key.clone()),
            ("base", self.config.base_currency.to_string()),
        ];
        if let Some(symbols) = symbols {
            query.push(("symbols", symbols));
        }

        let resp = self
            .client
            .get(self.latest_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::transport("fetching data from Fixer.io", e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::transport("reading response body", e))?;

        if !status.is_success() {
            return Err(SourceError::Remote {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                body,
            });
        }

        FixerResponse::from_body(&body)?.into_snapshot(&self.config.base_currency)
    }
}

#[async_trait]
impl RateSource for FixerClient {
    fn name(&self) -> &str {
        "fixer.io"
    }

    fn base_currency(&self) -> &CurrencyCode {
        &self.config.base_currency
    }

    async fn fetch_all(&self) -> SourceResult<RateSnapshot> {
        self.fetch_latest(None).await
    }

    async fn fetch_subset(&self, codes: &BTreeSet<CurrencyCode>) -> SourceResult<RateSnapshot> {
        if codes.is_empty() {
            return self.fetch_latest(None).await;
        }

        let symbols = codes
            .iter()
            .map(CurrencyCode::as_str)
            .collect::<Vec<_>>()
            .join(",");

        self.fetch_latest(Some(symbols)).await
    }
}
