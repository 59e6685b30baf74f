//! Route handlers for the logged in user's own account.

use axum::{Extension, Json, extract::State, http::StatusCode};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    CurrencyCode, Error, PasswordHash, ValidatedPassword,
    auth::{SessionState, invalidate_auth_cookie},
    user::{UserID, UserProfile, delete_user, get_user_by_id, update_password, update_profile},
};

/// Get the profile of the logged in user.
pub async fn get_me(
    State(state): State<SessionState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<UserProfile>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_user_by_id(user_id, &connection).map(|user| Json(user.into()))
}

/// The editable parts of a user's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    /// The name shown in the app.
    pub name: String,
    /// The preferred currency code, e.g. "NZD".
    pub currency: CurrencyCode,
}

/// Change the logged in user's name and currency.
pub async fn update_me(
    State(state): State<SessionState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<ProfileData>,
) -> Result<Json<UserProfile>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_profile(user_id, &data.name, &data.currency, &connection).map(|user| Json(user.into()))
}

/// The data needed to change a password.
#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    /// The password the user currently logs in with.
    pub current_password: String,
    /// The replacement password, checked for strength.
    pub new_password: String,
}

/// Change the logged in user's password.
///
/// # Errors
///
/// Responds with 401 Unauthorized if `current_password` is wrong, or 400 Bad
/// Request if the new password is too weak.
pub async fn change_password(
    State(state): State<SessionState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<PasswordChange>,
) -> Result<StatusCode, Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;
        get_user_by_id(user_id, &connection)?
    };

    let is_password_valid = user
        .password_hash
        .verify(&data.current_password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_valid {
        tracing::info!("User {user_id} gave the wrong password when changing it");
        return Err(Error::InvalidCredentials);
    }

    let new_password = ValidatedPassword::new(&data.new_password, &[&user.email, &user.name])?;
    let password_hash = PasswordHash::new(new_password, state.password_cost)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    update_password(user_id, &password_hash, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the logged in user and everything they own, then end the session.
pub async fn delete_me(
    State(state): State<SessionState>,
    Extension(user_id): Extension<UserID>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, StatusCode), Error> {
    {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;
        delete_user(user_id, &connection)?;
    }

    tracing::info!("Deleted user {user_id}");

    Ok((
        invalidate_auth_cookie(jar, state.secure_cookies),
        StatusCode::NO_CONTENT,
    ))
}
