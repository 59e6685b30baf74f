use rusqlite::Connection;

use crate::{
    CurrencyCode, PasswordHash, User, ValidatedPassword,
    db::initialize,
    user::{NewUser, create_user, parse_email},
};

/// A password that passes the strength check.
pub(crate) const TEST_PASSWORD: &str = "Marmalade-Typhoon-Saxophone-77";

/// The bcrypt cost used in tests, the minimum bcrypt allows.
pub(crate) const TEST_PASSWORD_COST: u32 = 4;

/// An in-memory database with all tables created.
#[track_caller]
pub(crate) fn test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("could not open in-memory database");
    initialize(&connection).expect("could not initialize database");

    connection
}

/// Insert a user with the password [TEST_PASSWORD].
#[track_caller]
pub(crate) fn insert_test_user(connection: &Connection, email: &str) -> User {
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        TEST_PASSWORD_COST,
    )
    .expect("could not hash test password");

    create_user(
        NewUser {
            email: parse_email(email).expect("invalid test email"),
            name: "Test User".to_owned(),
            currency: CurrencyCode::default(),
            password_hash,
        },
        connection,
    )
    .expect("could not create test user")
}
