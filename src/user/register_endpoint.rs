//! The route handler for registering a new user.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    CurrencyCode, Error, PasswordHash, ValidatedPassword,
    auth::{SessionState, set_auth_cookie},
    user::{NewUser, UserProfile, create_user, parse_email},
};

/// The data sent by the client to register an account.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterData {
    /// The email to log in with.
    pub email: String,
    /// The raw password, checked for strength before it is hashed.
    pub password: String,
    /// The name shown in the app. Defaults to the part of the email before the "@".
    #[serde(default)]
    pub name: String,
    /// The preferred currency, defaults to USD.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Handler for registering a new user.
///
/// The new user is logged in straight away, so the response sets the auth cookie.
///
/// # Errors
///
/// Responds with:
/// - 400 Bad Request if the email, currency or password is invalid,
/// - 409 Conflict if the email is already registered.
pub async fn register_user(
    State(state): State<SessionState>,
    jar: PrivateCookieJar,
    Json(data): Json<RegisterData>,
) -> Result<(StatusCode, PrivateCookieJar, Json<UserProfile>), Error> {
    let email = parse_email(&data.email)?;
    let currency = match data.currency.as_deref() {
        Some(raw) => CurrencyCode::new(raw)?,
        None => CurrencyCode::default(),
    };
    let name = match data.name.trim() {
        "" => email.local_part().to_owned(),
        name => name.to_owned(),
    };

    let password = ValidatedPassword::new(&data.password, &[email.as_str(), &name])?;
    let password_hash = PasswordHash::new(password, state.password_cost)?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        create_user(
            NewUser {
                email,
                name,
                currency,
                password_hash,
            },
            &connection,
        )?
    };

    tracing::info!("Registered user {}", user.id);

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration, state.secure_cookies)?;

    Ok((StatusCode::CREATED, jar, Json(user.into())))
}
