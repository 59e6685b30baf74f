//! The route handler for logging in with an email and password.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error, UserProfile,
    auth::cookie::{REMEMBER_ME_COOKIE_DURATION, set_auth_cookie},
    user::get_user_by_email,
};

/// The state needed to start a session for a user.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// Whether auth cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SessionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            secure_cookies: state.secure_cookies,
            password_cost: state.password_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SessionState> for Key {
    fn from_ref(state: &SessionState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials sent by the client to log in.
///
/// The password is a plain string. There is no need for validation here since
/// it will be compared against the password hash in the database.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// The email the user registered with.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to extend the initial auth cookie duration to one week.
    #[serde(default)]
    pub remember_me: bool,
}

/// Handler for log-in requests.
///
/// On success the auth cookie is set and the user's profile is returned.
///
/// # Errors
///
/// Responds with 401 Unauthorized if the email does not belong to a user or the password is
/// wrong. Both cases use the same message so that clients cannot probe for registered emails.
pub async fn post_log_in(
    State(state): State<SessionState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<LogInData>,
) -> Result<(PrivateCookieJar, Json<UserProfile>), Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(&credentials.email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    let is_password_valid = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_valid {
        tracing::info!("Failed log-in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let cookie_duration = if credentials.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = set_auth_cookie(jar, user.id, cookie_duration, state.secure_cookies)?;

    Ok((jar, Json(UserProfile::from(user))))
}
