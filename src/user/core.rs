//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The email the user logs in with, stored in lower case.
    pub email: String,
    /// The name shown in the app.
    pub name: String,
    /// The currency amounts are shown in by default.
    pub currency: CurrencyCode,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The parts of a [User] that are safe to send to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's ID.
    pub id: UserID,
    /// The email the user logs in with.
    pub email: String,
    /// The name shown in the app.
    pub name: String,
    /// The user's preferred currency.
    pub currency: CurrencyCode,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            currency: user.currency,
        }
    }
}

/// The data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// A parsed email address. It is normalized to lower case on insert.
    pub email: EmailAddress,
    /// The name shown in the app.
    pub name: String,
    /// The user's preferred currency.
    pub currency: CurrencyCode,
    /// The hash of the user's password.
    pub password_hash: PasswordHash,
}

/// Parse and normalize an email address so that lookups ignore case and surrounding whitespace.
///
/// # Errors
/// Returns [Error::InvalidEmail] if `raw_email` is not a valid email address.
pub fn parse_email(raw_email: &str) -> Result<EmailAddress, Error> {
    let normalized = raw_email.trim().to_lowercase();

    normalized
        .parse::<EmailAddress>()
        .map_err(|_| Error::InvalidEmail(raw_email.to_owned()))
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                currency TEXT NOT NULL DEFAULT 'USD',
                password TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns:
/// - [Error::DuplicateEmail] if the email is already registered,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (email, name, currency, password) VALUES (?1, ?2, ?3, ?4)
             RETURNING id, email, name, currency, password",
        )?
        .query_row(
            (
                new_user.email.as_str(),
                new_user.name.trim(),
                &new_user.currency,
                new_user.password_hash.as_ref(),
            ),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, name, currency, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(Error::from)
}

/// Get the user registered with `email`, ignoring case.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the email, which includes malformed emails.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    let email = email.trim().to_lowercase();

    connection
        .prepare("SELECT id, email, name, currency, password FROM user WHERE email = :email")?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(Error::from)
}

/// Change a user's display name and preferred currency.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn update_profile(
    user_id: UserID,
    name: &str,
    currency: &CurrencyCode,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(
            "UPDATE user SET name = ?1, currency = ?2 WHERE id = ?3
             RETURNING id, email, name, currency, password",
        )?
        .query_row((name.trim(), currency, user_id.as_i64()), map_user_row)
        .map_err(Error::from)
}

/// Replace the password hash of the user `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Delete a user along with their budgets and transactions.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM user WHERE id = ?1", (user_id.as_i64(),))?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(4)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        currency: row.get(3)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}
