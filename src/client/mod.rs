//! A typed client for the REST API with a local, per-month cache.
//!
//! [ApiClient] talks to the server. [CachedClient] wraps anything that
//! implements [BudgetApi] and keeps the results of list requests in a
//! [LocalCache], so that reads can be answered straight away while a fresh
//! copy is fetched in the background.

mod api;
mod cache;
mod sync;

use reqwest::StatusCode;

pub use api::{ApiClient, BudgetApi};
pub use cache::{CacheEntry, LocalCache, budgets_key, transactions_key};
pub use sync::{CachedClient, Fetched, Source};

/// The errors that may occur on the client side.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status code.
    #[error("the server responded with {status}: {message}")]
    Api {
        /// The HTTP status code of the response.
        status: StatusCode,
        /// The error message from the response body.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("could not reach the server: {0}")]
    Http(#[from] reqwest::Error),

    /// The local cache database failed.
    #[error("the local cache failed: {0}")]
    Cache(#[from] rusqlite::Error),

    /// A cached value could not be converted to or from JSON.
    #[error("could not read or write a cached value: {0}")]
    Json(#[from] serde_json::Error),

    /// Could not acquire the lock on the cache database.
    #[error("could not acquire the cache lock")]
    CacheLock,

    /// An operation that needs a session was attempted before logging in.
    #[error("you need to log in first")]
    NotLoggedIn,
}

impl ClientError {
    /// The HTTP status code if the error came from the server.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(error) => error.status(),
            _ => None,
        }
    }
}
