#![allow(missing_docs)]

pub(crate) mod db;
pub(crate) mod rates;
pub(crate) mod server;

pub(crate) use db::{TEST_PASSWORD, insert_test_user, test_connection};
pub(crate) use rates::{StubRateProvider, test_converter};
pub(crate) use server::{
    log_in, test_app_state, test_server, test_server_with_provider, test_session_state,
};
