//! The route handler for ending a session.

use axum::{extract::State, http::StatusCode};
use axum_extra::extract::PrivateCookieJar;

use crate::auth::{cookie::invalidate_auth_cookie, log_in::SessionState};

/// Invalidate the auth cookie so the client has to log in again.
///
/// This route does not require a valid session, logging out twice is harmless.
pub async fn post_log_out(
    State(state): State<SessionState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, StatusCode) {
    (
        invalidate_auth_cookie(jar, state.secure_cookies),
        StatusCode::NO_CONTENT,
    )
}
