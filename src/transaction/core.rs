//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    budget::reconcile::{add_contribution, remove_contribution, resolve_budget},
    database_id::{BudgetId, TransactionId},
    money::is_valid_amount,
    user::UserID,
};

/// The longest description, in characters, that a transaction may have.
pub(crate) const MAX_DESCRIPTION_LENGTH: usize = 255;

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Money that was earned.
    Income,
    /// Money that was spent. Only expenses count towards a budget.
    Expense,
}

impl TransactionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            _ => Err(format!("unknown transaction type \"{s}\"")),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// The amount of money spent or earned, always greater than zero.
    pub amount: f64,
    /// Whether the money was spent or earned.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// What the money was spent on or where it came from, e.g. "Groceries".
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// The budget the transaction counts towards, if any.
    pub budget_id: Option<BudgetId>,
}

impl Transaction {
    /// How much the transaction adds to its budget's `spent` total, and which budget that is.
    ///
    /// Income never counts towards a budget, even when linked to one.
    pub(crate) fn contribution(&self) -> Option<(BudgetId, f64)> {
        match (self.transaction_type, self.budget_id) {
            (TransactionType::Expense, Some(budget_id)) => Some((budget_id, self.amount)),
            _ => None,
        }
    }
}

/// The user editable fields of a transaction, used to create and update transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// The amount of money spent or earned, must be greater than zero.
    pub amount: f64,
    /// Whether the money was spent or earned.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// What the money was spent on or where it came from.
    pub category: String,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// When the transaction happened, must not be after today.
    pub date: Date,
    /// Link the transaction to this budget instead of finding one by category and month.
    #[serde(default)]
    pub budget_id: Option<BudgetId>,
}

impl NewTransaction {
    /// Create an unlinked expense with an empty description.
    pub fn expense(amount: f64, category: &str, date: Date) -> Self {
        Self {
            amount,
            transaction_type: TransactionType::Expense,
            category: category.to_owned(),
            description: String::new(),
            date,
            budget_id: None,
        }
    }

    /// Create an unlinked income with an empty description.
    pub fn income(amount: f64, category: &str, date: Date) -> Self {
        Self {
            transaction_type: TransactionType::Income,
            ..Self::expense(amount, category, date)
        }
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Link the transaction to a specific budget.
    pub fn budget_id(mut self, budget_id: Option<BudgetId>) -> Self {
        self.budget_id = budget_id;
        self
    }

    /// Check the fields and trim the category and description.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::InvalidAmount] if the amount is not a positive, finite number,
    /// - [Error::EmptyCategory] if the category is blank,
    /// - [Error::DescriptionTooLong] if the description is over [MAX_DESCRIPTION_LENGTH] characters,
    /// - [Error::FutureDate] if the date is after `today`.
    pub fn validate(mut self, today: Date) -> Result<Self, Error> {
        if !is_valid_amount(self.amount) {
            return Err(Error::InvalidAmount(self.amount));
        }

        self.category = self.category.trim().to_owned();
        if self.category.is_empty() {
            return Err(Error::EmptyCategory);
        }

        self.description = self.description.trim().to_owned();
        let description_length = self.description.chars().count();
        if description_length > MAX_DESCRIPTION_LENGTH {
            return Err(Error::DescriptionTooLong(description_length));
        }

        if self.date > today {
            return Err(Error::FutureDate(self.date));
        }

        Ok(self)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Selects every column of the transaction table in the order [map_transaction_row] expects.
pub(crate) const SELECT_COLUMNS: &str =
    "SELECT id, user_id, amount, type, category, description, date, budget_id FROM \"transaction\"";

/// Create a transaction for `user_id` and add it to its budget's spent total.
///
/// The budget is the one named by `new_transaction.budget_id`, or for
/// expenses without one, the user's budget with the same category and month.
/// The insert and the budget adjustment are applied together or not at all.
///
/// # Errors
/// This function will return a:
/// - validation error from [NewTransaction::validate],
/// - [Error::InvalidBudget] if the budget ID does not refer to one of the user's budgets,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    new_transaction: NewTransaction,
    today: Date,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let new_transaction = new_transaction.validate(today)?;
    let sql_transaction = connection.unchecked_transaction()?;

    let budget_id = resolve_budget(user_id, &new_transaction, &sql_transaction)?;

    let transaction = sql_transaction
        .prepare(
            "INSERT INTO \"transaction\" (user_id, amount, type, category, description, date, budget_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, user_id, amount, type, category, description, date, budget_id",
        )?
        .query_row(
            (
                user_id.as_i64(),
                new_transaction.amount,
                new_transaction.transaction_type,
                &new_transaction.category,
                &new_transaction.description,
                new_transaction.date,
                budget_id,
            ),
            map_transaction_row,
        )?;

    add_contribution(&transaction, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Retrieve one of the user's transactions by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "{SELECT_COLUMNS} WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &id), (":user_id", &user_id.as_i64())],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Replace the editable fields of one of the user's transactions.
///
/// The old amount is taken off the budget the transaction was linked to,
/// then the new amount is added to the budget it resolves to now. This
/// covers changes to the amount, type, category, date and budget.
///
/// # Errors
/// Returns the same errors as [create_transaction], and [Error::NotFound]
/// if `id` does not refer to a transaction owned by `user_id`.
pub fn update_transaction(
    user_id: UserID,
    id: TransactionId,
    new_transaction: NewTransaction,
    today: Date,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let new_transaction = new_transaction.validate(today)?;
    let sql_transaction = connection.unchecked_transaction()?;

    let old_transaction = get_transaction(user_id, id, &sql_transaction)?;
    remove_contribution(&old_transaction, &sql_transaction)?;

    let budget_id = resolve_budget(user_id, &new_transaction, &sql_transaction)?;

    let transaction = sql_transaction
        .prepare(
            "UPDATE \"transaction\"
             SET amount = ?1, type = ?2, category = ?3, description = ?4, date = ?5, budget_id = ?6
             WHERE id = ?7 AND user_id = ?8
             RETURNING id, user_id, amount, type, category, description, date, budget_id",
        )?
        .query_row(
            (
                new_transaction.amount,
                new_transaction.transaction_type,
                &new_transaction.category,
                &new_transaction.description,
                new_transaction.date,
                budget_id,
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )?;

    add_contribution(&transaction, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete one of the user's transactions and take it off its budget's spent total.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`.
pub fn delete_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = get_transaction(user_id, id, &sql_transaction)?;
    sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;
    remove_contribution(&transaction, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Get the number of transactions the user has.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1",
            (user_id.as_i64(),),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// The budget table must exist first.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
                category TEXT NOT NULL COLLATE NOCASE,
                description TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                budget_id INTEGER,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Listing by month and fallback matching both filter on these columns.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_budget ON \"transaction\"(budget_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// The row must have the columns of [SELECT_COLUMNS] in the same order.
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount: row.get(2)?,
        transaction_type: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        date: row.get(6)?,
        budget_id: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
