//! Converts between currencies with a time limited cache of exchange rates.

use std::{fmt::Debug, sync::Arc, time::Duration};

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, Error, ExchangeRates, RateProvider, money::round_cents};

/// How long fetched exchange rates are reused before asking the provider again.
pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(60 * 60);

/// The number of base currencies whose rates are kept at once.
const MAX_CACHED_BASES: u64 = 256;

/// The result of converting an amount between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// The amount in `from`.
    pub amount: f64,
    /// The currency converted from.
    pub from: CurrencyCode,
    /// The currency converted to.
    pub to: CurrencyCode,
    /// How many units of `to` one unit of `from` buys.
    pub rate: f64,
    /// The amount in `to`, rounded to cents.
    pub converted: f64,
}

/// Converts amounts between currencies.
///
/// Rates are fetched from a [RateProvider] once per base currency and reused
/// until they are older than the configured time-to-live. Cloning the
/// converter shares the cache.
#[derive(Clone)]
pub struct CurrencyConverter {
    provider: Arc<dyn RateProvider>,
    cache: Cache<CurrencyCode, Arc<ExchangeRates>>,
}

impl Debug for CurrencyConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrencyConverter")
            .field("cached_bases", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CurrencyConverter {
    /// Create a converter that caches rates from `provider` for `ttl`.
    pub fn new(provider: impl RateProvider + 'static, ttl: Duration) -> Self {
        Self {
            provider: Arc::new(provider),
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_BASES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// The latest rates relative to `base`, from the cache if they are fresh enough.
    ///
    /// # Errors
    /// Returns the provider's error if the rates are not cached and cannot be fetched.
    ///
    /// Concurrent requests for the same base share a single fetch. Failed
    /// fetches are not cached.
    pub async fn rates(&self, base: &CurrencyCode) -> Result<Arc<ExchangeRates>, Error> {
        self.cache
            .try_get_with_by_ref(base, async {
                self.provider.latest(base).await.map(Arc::new)
            })
            .await
            .map_err(unshare_error)
    }

    /// Convert `amount` from one currency to another.
    ///
    /// Converting a currency to itself does not look up any rates.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::InvalidAmount] if `amount` is not a finite number,
    /// - [Error::UnknownCurrency] if there is no rate for `to`,
    /// - the provider's error if the rates cannot be fetched.
    pub async fn convert(
        &self,
        amount: f64,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Conversion, Error> {
        if !amount.is_finite() {
            return Err(Error::InvalidAmount(amount));
        }

        let rate = if from == to {
            1.0
        } else {
            self.rates(from).await?.rate(to)?
        };

        Ok(Conversion {
            amount,
            from: from.clone(),
            to: to.clone(),
            rate,
            converted: round_cents(amount * rate),
        })
    }
}

/// Take back the provider error that moka shares between waiting requests.
fn unshare_error(error: Arc<Error>) -> Error {
    Arc::try_unwrap(error).unwrap_or_else(|shared| match shared.as_ref() {
        Error::RateProviderError(message) => Error::RateProviderError(message.clone()),
        other => Error::RateProviderError(other.to_string()),
    })
}
