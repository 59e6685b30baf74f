//! Budget Sync is a REST API and client library for tracking personal
//! spending against monthly budgets.
//!
//! The server keeps every budget's `spent` total in step with the expense
//! transactions linked to it, and the [client] module offers a typed HTTP
//! client with a per-user, per-month cache that serves stale data
//! immediately while revalidating in the background.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::Date;
use tokio::signal;

mod app_state;
mod auth;
mod budget;
pub mod client;
mod currency;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod money;
mod not_found;
mod period;
mod routing;
mod summary;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppConfig, AppState};
pub use auth::{PasswordHash, ValidatedPassword};
pub use budget::{Budget, BudgetSummary, NewBudget, create_budget};
pub use currency::{
    Conversion, CurrencyCode, CurrencyConverter, DEFAULT_RATE_API_URL, DEFAULT_RATE_TTL,
    ExchangeRates, HttpRateProvider, RateProvider,
};
pub use database_id::{BudgetId, DatabaseId, TransactionId};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use period::BudgetPeriod;
pub use routing::build_router;
pub use summary::MonthlySummary;
pub use timezone::get_local_offset;
pub use transaction::{NewTransaction, Transaction, TransactionType, create_transaction};
pub use user::{
    NewUser, User, UserID, UserProfile, create_user, get_user_by_email, parse_email,
    update_password,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an incorrect email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth cookie is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// There was an error parsing the date in the cookie or creating the new
    /// expiry date time.
    ///
    /// Callers should pass in the original error as a string and the date
    /// string that caused the error.
    #[error("could not format expiry cookie date-time string \"{1}\": {0}")]
    InvalidDateFormat(String, String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address could not be parsed.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// Another user has already registered with the email address.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// A currency code was not three ASCII letters.
    #[error("\"{0}\" is not a valid ISO 4217 currency code")]
    InvalidCurrency(String),

    /// The exchange rate provider has no rate for the currency.
    #[error("no exchange rate is available for {0}")]
    UnknownCurrency(String),

    /// The exchange rate provider could not be reached or sent an unusable
    /// response.
    #[error("could not fetch exchange rates: {0}")]
    RateProviderError(String),

    /// Amounts must be positive, finite numbers.
    ///
    /// Whether money was spent or earned is given by the transaction type,
    /// not the sign of the amount.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// An empty string was used as a category.
    #[error("category cannot be empty")]
    EmptyCategory,

    /// The description exceeded the maximum length.
    #[error("description is {0} characters long, the limit is {limit}", limit = transaction::MAX_DESCRIPTION_LENGTH)]
    DescriptionTooLong(usize),

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// A month outside of 1 to 12 was given.
    #[error("{0} is not a valid month")]
    InvalidMonth(u8),

    /// A year outside of the supported range was given.
    #[error("{0} is not a supported year")]
    InvalidYear(i32),

    /// The budget ID given for a transaction does not refer to one of the
    /// user's budgets.
    #[error("the budget ID {0} does not refer to a valid budget")]
    InvalidBudget(BudgetId),

    /// The user already has a budget for the category in the same month.
    #[error("a budget for \"{category}\" in {period} already exists")]
    DuplicateBudget {
        /// The category of the conflicting budget.
        category: String,
        /// The month of the conflicting budget.
        period: BudgetPeriod,
    },

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code that best describes the error to a client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::CookieMissing => StatusCode::UNAUTHORIZED,
            Error::TooWeak(_)
            | Error::InvalidEmail(_)
            | Error::InvalidCurrency(_)
            | Error::UnknownCurrency(_)
            | Error::InvalidAmount(_)
            | Error::EmptyCategory
            | Error::DescriptionTooLong(_)
            | Error::FutureDate(_)
            | Error::InvalidMonth(_)
            | Error::InvalidYear(_)
            | Error::InvalidBudget(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateEmail | Error::DuplicateBudget { .. } => StatusCode::CONFLICT,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::RateProviderError(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidDateFormat(_, _)
            | Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Any errors that are not handled above are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            match self {
                Error::RateProviderError(_) => self.to_string(),
                _ => "An unexpected error occurred, check the server logs for more details."
                    .to_owned(),
            }
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
