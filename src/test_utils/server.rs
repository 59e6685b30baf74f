use std::sync::{Arc, Mutex};

use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppConfig, AppState, User,
    app_state::create_cookie_key,
    auth::{COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, SessionState},
    build_router, endpoints,
};

use super::{
    StubRateProvider,
    db::{TEST_PASSWORD, TEST_PASSWORD_COST, insert_test_user, test_connection},
    test_converter,
};

const TEST_SECRET: &str = "this-is-only-a-test-secret";

/// The state for the log in, log out and user handlers, backed by an empty database.
pub(crate) fn test_session_state() -> SessionState {
    SessionState {
        cookie_key: create_cookie_key(TEST_SECRET),
        cookie_duration: DEFAULT_COOKIE_DURATION,
        secure_cookies: true,
        password_cost: TEST_PASSWORD_COST,
        db_connection: Arc::new(Mutex::new(test_connection())),
    }
}

/// App state with an empty in-memory database, UTC as the local timezone and stub exchange rates.
pub(crate) fn test_app_state(provider: StubRateProvider) -> AppState {
    let config = AppConfig {
        password_cost: TEST_PASSWORD_COST,
        ..AppConfig::new(TEST_SECRET, "Etc/UTC")
    };

    AppState::new(
        Connection::open_in_memory().expect("could not open in-memory database"),
        config,
        test_converter(provider),
    )
    .expect("could not create app state")
}

/// A server running the full router with one registered user, alice@example.com.
pub(crate) fn test_server() -> (TestServer, User) {
    test_server_with_provider(StubRateProvider::default())
}

/// Like [test_server], but with exchange rates from `provider`.
pub(crate) fn test_server_with_provider(provider: StubRateProvider) -> (TestServer, User) {
    let state = test_app_state(provider);
    let user = {
        let connection = state.db_connection.lock().expect("could not lock database");
        insert_test_user(&connection, "alice@example.com")
    };

    let server = TestServer::new(build_router(state)).expect("could not create test server");

    (server, user)
}

/// Log in as `email` with [TEST_PASSWORD] and return the auth cookie.
pub(crate) async fn log_in(server: &TestServer, email: &str) -> Cookie<'static> {
    let response = server
        .post(endpoints::LOG_IN)
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    response.assert_status_ok();

    response.cookie(COOKIE_TOKEN)
}
