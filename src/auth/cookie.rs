//! Defines functions for handling user authentication with cookies.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, UserID, auth::token::Token};

/// The name of the cookie that holds the session [Token].
pub(crate) const COOKIE_TOKEN: &str = "auth_token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);
/// How long the auth cookie should last if the user asks to stay logged in.
pub(crate) const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// Sets the expiry of the cookie to `duration` from the current time.
///
/// # Errors
///
/// Returns an [Error::InvalidDateFormat] if the expiry cannot be serialized.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
    secure: bool,
) -> Result<PrivateCookieJar, Error> {
    let token = Token {
        user_id,
        expires_at: OffsetDateTime::now_utc() + duration,
    };

    add_token_cookie(jar, &token, secure)
}

fn add_token_cookie(
    jar: PrivateCookieJar,
    token: &Token,
    secure: bool,
) -> Result<PrivateCookieJar, Error> {
    let token_string = serde_json::to_string(token)
        .map_err(|error| Error::InvalidDateFormat(error.to_string(), token.expires_at.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .expires(token.expires_at)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(secure),
    ))
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar, secure: bool) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(secure),
    )
}

/// Read and check the session token in `jar`.
///
/// # Errors
///
/// Returns:
/// - [Error::CookieMissing] if there is no auth cookie,
/// - [Error::InvalidCredentials] if the cookie does not hold a token or the token has expired.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;

    let token: Token =
        serde_json::from_str(cookie.value_trimmed()).map_err(|_| Error::InvalidCredentials)?;

    if token.is_expired(OffsetDateTime::now_utc()) {
        return Err(Error::InvalidCredentials);
    }

    Ok(token)
}

/// Push the expiry of the auth cookie in `jar` out to UTC now plus
/// `duration`, unless it already expires later than that.
///
/// # Errors
///
/// The cookie jar is not modified if an error is returned.
///
/// Returns the errors of [get_token_from_cookies] and [set_auth_cookie].
pub(crate) fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    duration: Duration,
    secure: bool,
) -> Result<PrivateCookieJar, Error> {
    let token = get_token_from_cookies(&jar)?;

    let new_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or_else(|| {
            Error::InvalidDateFormat(
                "expiry overflowed".to_owned(),
                token.expires_at.to_string(),
            )
        })?;

    if new_expiry <= token.expires_at {
        return Ok(jar);
    }

    add_token_cookie(
        jar,
        &Token {
            user_id: token.user_id,
            expires_at: new_expiry,
        },
        secure,
    )
}
