//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, budget::create_budget_table, transaction::create_transaction_table,
    user::create_user_table,
};

/// Create the all of the database tables for the application.
///
/// Foreign key enforcement is switched on for the connection, since budget
/// links and user ownership rely on `ON DELETE` actions.
///
/// # Errors
/// This function may return a [Error::SqlError] if an SQL error occurred.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
