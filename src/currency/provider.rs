//! Where exchange rates come from.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, Error};

/// The default exchange rate API, which needs no API key.
pub const DEFAULT_RATE_API_URL: &str = "https://open.er-api.com/v6";

/// The value of one unit of `base` in other currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    /// The currency the rates are relative to.
    pub base: CurrencyCode,
    /// Maps upper case currency codes to how many units of that currency one unit of `base` buys.
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    /// The rate from the base currency to `target`.
    ///
    /// # Errors
    /// Returns [Error::UnknownCurrency] if there is no rate for `target`.
    pub fn rate(&self, target: &CurrencyCode) -> Result<f64, Error> {
        if *target == self.base {
            return Ok(1.0);
        }

        self.rates
            .get(target.as_str())
            .copied()
            .ok_or_else(|| Error::UnknownCurrency(target.to_string()))
    }
}

/// A source of up to date exchange rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the latest rates relative to `base`.
    async fn latest(&self, base: &CurrencyCode) -> Result<ExchangeRates, Error>;
}

/// Fetches rates from an open.er-api.com compatible HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    api_url: String,
}

impl HttpRateProvider {
    /// Create a provider that sends requests to `api_url`, e.g. [DEFAULT_RATE_API_URL].
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default)]
    base_code: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

impl LatestRatesResponse {
    fn into_rates(self, requested: &CurrencyCode) -> Result<ExchangeRates, Error> {
        if self.result != "success" {
            let reason = self.error_type.unwrap_or(self.result);

            return Err(match reason.as_str() {
                "unsupported-code" => Error::UnknownCurrency(requested.to_string()),
                _ => Error::RateProviderError(reason),
            });
        }

        let base = match self.base_code {
            Some(code) => CurrencyCode::new(&code)
                .map_err(|_| Error::RateProviderError(format!("bad base code {code}")))?,
            None => requested.clone(),
        };

        Ok(ExchangeRates {
            base,
            rates: self.rates,
        })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn latest(&self, base: &CurrencyCode) -> Result<ExchangeRates, Error> {
        let url = format!("{}/latest/{}", self.api_url, base);
        tracing::debug!("Fetching exchange rates from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| Error::RateProviderError(error.to_string()))?;

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|error| Error::RateProviderError(error.to_string()))?;

        body.into_rates(base)
    }
}
