//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error, PasswordHash, auth::DEFAULT_COOKIE_DURATION, currency::CurrencyConverter, db::initialize,
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// Whether auth cookies carry the `Secure` attribute.
    pub secure_cookies: bool,

    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// Used to work out which month "now" is when a request does not name one.
    pub local_timezone: String,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// Converts amounts between currencies using cached exchange rates.
    pub currency_converter: CurrencyConverter,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is not recognised.
    pub fn new(
        db_connection: Connection,
        config: AppConfig,
        currency_converter: CurrencyConverter,
    ) -> Result<Self, Error> {
        if get_local_offset(&config.local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(config.local_timezone));
        }

        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(&config.cookie_secret),
            cookie_duration: config.cookie_duration,
            secure_cookies: config.secure_cookies,
            password_cost: config.password_cost,
            local_timezone: config.local_timezone,
            db_connection: Arc::new(Mutex::new(db_connection)),
            currency_converter,
        })
    }
}

/// The settings needed to build an [AppState].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The secret string the cookie signing key is derived from.
    pub cookie_secret: String,
    /// The canonical name of the server's timezone, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// How long an auth cookie lasts without activity.
    pub cookie_duration: Duration,
    /// Whether auth cookies should only be sent over HTTPS.
    ///
    /// Only disable this when the server is reached over plain HTTP, e.g. on localhost.
    pub secure_cookies: bool,
    /// The bcrypt cost for hashing passwords, see [PasswordHash::DEFAULT_COST].
    pub password_cost: u32,
}

impl AppConfig {
    /// Create a config with the default cookie duration.
    pub fn new(cookie_secret: &str, local_timezone: &str) -> Self {
        Self {
            cookie_secret: cookie_secret.to_owned(),
            local_timezone: local_timezone.to_owned(),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            secure_cookies: true,
            password_cost: PasswordHash::DEFAULT_COST,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
