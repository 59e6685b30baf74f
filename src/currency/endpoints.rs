//! Route handlers for exchange rates and currency conversion.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, CurrencyCode, CurrencyConverter, Error, ExchangeRates,
    currency::Conversion,
    user::{UserID, get_user_by_id},
};

/// The state needed to look up exchange rates.
#[derive(Debug, Clone)]
pub struct CurrencyState {
    /// Used to look up the user's preferred currency.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The shared exchange rate cache.
    pub currency_converter: CurrencyConverter,
}

impl FromRef<AppState> for CurrencyState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            currency_converter: state.currency_converter.clone(),
        }
    }
}

/// The query string for the exchange rates endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RatesQuery {
    /// The currency to get rates for, defaults to the user's currency.
    pub base: Option<String>,
}

/// The query string for the conversion endpoint.
#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    /// The amount to convert.
    pub amount: f64,
    /// The currency to convert from, defaults to the user's currency.
    pub from: Option<String>,
    /// The currency to convert to.
    pub to: String,
}

fn users_currency(user_id: UserID, state: &CurrencyState) -> Result<CurrencyCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_user_by_id(user_id, &connection).map(|user| user.currency)
}

fn parse_or_default(
    raw_code: Option<&str>,
    user_id: UserID,
    state: &CurrencyState,
) -> Result<CurrencyCode, Error> {
    match raw_code {
        Some(raw_code) => CurrencyCode::new(raw_code),
        None => users_currency(user_id, state),
    }
}

/// A route handler for the latest exchange rates.
///
/// # Errors
///
/// Responds with 400 Bad Request for invalid currency codes and 502 Bad
/// Gateway if the rates cannot be fetched.
pub async fn get_rates_endpoint(
    State(state): State<CurrencyState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<ExchangeRates>, Error> {
    let base = parse_or_default(query.base.as_deref(), user_id, &state)?;

    let rates = state.currency_converter.rates(&base).await?;

    Ok(Json(rates.as_ref().clone()))
}

/// A route handler for converting an amount between currencies.
pub async fn convert_endpoint(
    State(state): State<CurrencyState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<Conversion>, Error> {
    let from = parse_or_default(query.from.as_deref(), user_id, &state)?;
    let to = CurrencyCode::new(&query.to)?;

    state
        .currency_converter
        .convert(query.amount, &from, &to)
        .await
        .map(Json)
}
