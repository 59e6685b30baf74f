//! Route handlers for creating, reading, updating and deleting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, NewTransaction, Transaction,
    database_id::TransactionId,
    timezone::local_today,
    transaction::{
        TransactionFilter, TransactionListQuery, create_transaction, delete_transaction,
        get_transaction, list_transactions, update_transaction,
    },
    user::UserID,
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for creating a new transaction, responds with 201 Created and the transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = create_transaction(user_id, new_transaction, today, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for getting one transaction.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_transaction(user_id, transaction_id, &connection).map(Json)
}

/// A route handler for listing the transactions in one month.
///
/// The month defaults to the current month in the server's timezone.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let today = local_today(&state.local_timezone)?;
    let filter = TransactionFilter {
        period: query.period().resolve(today)?,
        transaction_type: query.transaction_type,
        category: query.category.filter(|category| !category.trim().is_empty()),
    };

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    list_transactions(user_id, &filter, &connection).map(Json)
}

/// A route handler for replacing a transaction's fields.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<Json<Transaction>, Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_transaction(user_id, transaction_id, new_transaction, today, &connection).map(Json)
}

/// A route handler for deleting a transaction, responds with 204 No Content.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(user_id, transaction_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
