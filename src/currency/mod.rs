//! Currency codes, exchange rates and conversion.

mod code;
mod converter;
mod endpoints;
mod provider;

pub use code::CurrencyCode;
pub use converter::{Conversion, CurrencyConverter, DEFAULT_RATE_TTL};
pub use endpoints::{ConvertQuery, CurrencyState, RatesQuery, convert_endpoint, get_rates_endpoint};
pub use provider::{DEFAULT_RATE_API_URL, ExchangeRates, HttpRateProvider, RateProvider};
