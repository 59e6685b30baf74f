use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    CurrencyCode, CurrencyConverter, Error, ExchangeRates, RateProvider,
    currency::DEFAULT_RATE_TTL,
};

/// A rate provider with fixed rates that counts how often it is called.
///
/// Every base currency gets the same table: 1 unit buys 1 USD, 1.75 NZD or 0.9 EUR.
#[derive(Debug, Clone, Default)]
pub(crate) struct StubRateProvider {
    calls: Arc<AtomicUsize>,
    fail: bool,
    delay: Option<Duration>,
}

impl StubRateProvider {
    /// A provider that always fails as if the rate API were down.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A provider that takes `delay` to answer each request.
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// How many times rates were requested from this provider or its clones.
    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for StubRateProvider {
    async fn latest(&self, base: &CurrencyCode) -> Result<ExchangeRates, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(Error::RateProviderError("stub provider is down".to_owned()));
        }

        Ok(ExchangeRates {
            base: base.clone(),
            rates: HashMap::from([
                ("USD".to_owned(), 1.0),
                ("NZD".to_owned(), 1.75),
                ("EUR".to_owned(), 0.9),
            ]),
        })
    }
}

/// A converter using `provider` with the default cache time-to-live.
pub(crate) fn test_converter(provider: StubRateProvider) -> CurrencyConverter {
    CurrencyConverter::new(provider, DEFAULT_RATE_TTL)
}
