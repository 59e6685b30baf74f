//! Defines budgets and the database queries for them.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    BudgetPeriod, Error,
    budget::reconcile::{adopt_matching_transactions, recompute_spent, release_transactions},
    database_id::BudgetId,
    money::{is_valid_amount, round_cents},
    user::UserID,
};

/// A spending limit for one category in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user that owns the budget.
    pub user_id: UserID,
    /// The category of expenses the budget covers, e.g. "Groceries".
    pub category: String,
    /// The most the user wants to spend.
    pub amount: f64,
    /// The total of the expenses linked to the budget, never negative.
    pub spent: f64,
    /// The year of the month the budget covers.
    pub year: i32,
    /// The month the budget covers, starting from 1 for January.
    pub month: u8,
}

impl Budget {
    /// The month the budget covers.
    pub fn period(&self) -> BudgetPeriod {
        BudgetPeriod {
            year: self.year,
            month: self.month,
        }
    }
}

/// A [Budget] along with how much of it is left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    /// The budget.
    #[serde(flatten)]
    pub budget: Budget,
    /// How much can still be spent. Negative once the budget is exceeded.
    pub remaining: f64,
    /// Whether more has been spent than budgeted.
    pub over_budget: bool,
}

impl From<Budget> for BudgetSummary {
    fn from(budget: Budget) -> Self {
        let remaining = round_cents(budget.amount - budget.spent);

        Self {
            over_budget: budget.spent > budget.amount,
            remaining,
            budget,
        }
    }
}

/// The user editable fields of a budget, used to create and update budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBudget {
    /// The category of expenses the budget covers.
    pub category: String,
    /// The most the user wants to spend, must be greater than zero.
    pub amount: f64,
    /// The year of the month the budget covers.
    pub year: i32,
    /// The month the budget covers.
    pub month: u8,
}

impl NewBudget {
    /// Create a budget for `category` in `period`.
    pub fn new(category: &str, amount: f64, period: BudgetPeriod) -> Self {
        Self {
            category: category.to_owned(),
            amount,
            year: period.year,
            month: period.month,
        }
    }

    fn validate(mut self) -> Result<(Self, BudgetPeriod), Error> {
        if !is_valid_amount(self.amount) {
            return Err(Error::InvalidAmount(self.amount));
        }

        self.category = self.category.trim().to_owned();
        if self.category.is_empty() {
            return Err(Error::EmptyCategory);
        }

        let period = BudgetPeriod::new(self.year, self.month)?;

        Ok((self, period))
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, category, amount, spent, year, month FROM budget";

/// Create a budget and link the user's unlinked expenses in the same category and month to it.
///
/// The new budget's `spent` is the total of the expenses it adopts.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount], [Error::EmptyCategory], [Error::InvalidMonth] or
///   [Error::InvalidYear] if `new_budget` is invalid,
/// - [Error::DuplicateBudget] if the user already has a budget for the category and month,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(
    user_id: UserID,
    new_budget: NewBudget,
    connection: &Connection,
) -> Result<Budget, Error> {
    let (new_budget, period) = new_budget.validate()?;
    let sql_transaction = connection.unchecked_transaction()?;

    let budget = sql_transaction
        .prepare(
            "INSERT INTO budget (user_id, category, amount, spent, year, month)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)
             RETURNING id, user_id, category, amount, spent, year, month",
        )?
        .query_row(
            (
                user_id.as_i64(),
                &new_budget.category,
                new_budget.amount,
                period.year,
                period.month,
            ),
            map_budget_row,
        )
        .map_err(|error| map_duplicate_budget(error, &new_budget.category, period))?;

    adopt_matching_transactions(&budget, &sql_transaction)?;
    let spent = recompute_spent(budget.id, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(Budget { spent, ..budget })
}

/// Retrieve one of the user's budgets by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a budget owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_budget(user_id: UserID, id: BudgetId, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS} WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &id), (":user_id", &user_id.as_i64())],
            map_budget_row,
        )
        .map_err(Error::from)
}

/// Get the user's budgets for `period`, sorted by category.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn list_budgets(
    user_id: UserID,
    period: BudgetPeriod,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND year = ?2 AND month = ?3
             ORDER BY category COLLATE NOCASE ASC, id ASC"
        ))?
        .query_map((user_id.as_i64(), period.year, period.month), map_budget_row)?
        .map(|budget_result| budget_result.map_err(Error::SqlError))
        .collect()
}

/// Replace the editable fields of one of the user's budgets.
///
/// When the category or month changes, the budget lets go of the
/// transactions linked to it, adopts the user's unlinked expenses in the new
/// category and month, and recomputes `spent`. Changing only the amount
/// keeps the linked transactions.
///
/// # Errors
/// Returns the same errors as [create_budget], and [Error::NotFound] if `id`
/// does not refer to a budget owned by `user_id`.
pub fn update_budget(
    user_id: UserID,
    id: BudgetId,
    new_budget: NewBudget,
    connection: &Connection,
) -> Result<Budget, Error> {
    let (new_budget, period) = new_budget.validate()?;
    let sql_transaction = connection.unchecked_transaction()?;

    let old_budget = get_budget(user_id, id, &sql_transaction)?;

    let budget = sql_transaction
        .prepare(
            "UPDATE budget SET category = ?1, amount = ?2, year = ?3, month = ?4
             WHERE id = ?5 AND user_id = ?6
             RETURNING id, user_id, category, amount, spent, year, month",
        )?
        .query_row(
            (
                &new_budget.category,
                new_budget.amount,
                period.year,
                period.month,
                id,
                user_id.as_i64(),
            ),
            map_budget_row,
        )
        .map_err(|error| map_duplicate_budget(error, &new_budget.category, period))?;

    let is_same_identity = old_budget.period() == period
        && old_budget.category.to_lowercase() == budget.category.to_lowercase();

    let budget = if is_same_identity {
        budget
    } else {
        tracing::debug!(
            "Budget {id} moved from {} {} to {} {}, relinking transactions",
            old_budget.category,
            old_budget.period(),
            budget.category,
            period
        );
        release_transactions(budget.id, &sql_transaction)?;
        adopt_matching_transactions(&budget, &sql_transaction)?;
        let spent = recompute_spent(budget.id, &sql_transaction)?;

        Budget { spent, ..budget }
    };

    sql_transaction.commit()?;

    Ok(budget)
}

/// Delete one of the user's budgets.
///
/// Transactions linked to the budget are kept and become unlinked.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a budget owned by `user_id`.
pub fn delete_budget(user_id: UserID, id: BudgetId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Set a budget's `spent` to the total of the expenses linked to it.
///
/// This repairs any drift between the stored total and the linked transactions.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a budget owned by `user_id`.
pub fn recalculate_budget(
    user_id: UserID,
    id: BudgetId,
    connection: &Connection,
) -> Result<Budget, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let budget = get_budget(user_id, id, &sql_transaction)?;
    let spent = recompute_spent(budget.id, &sql_transaction)?;

    sql_transaction.commit()?;

    if spent != budget.spent {
        tracing::info!(
            "Recalculated budget {id}: spent was {}, now {spent}",
            budget.spent
        );
    }

    Ok(Budget { spent, ..budget })
}

/// Create the budget table in the database.
///
/// The user table must exist first.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL COLLATE NOCASE,
                amount REAL NOT NULL CHECK (amount > 0),
                spent REAL NOT NULL DEFAULT 0 CHECK (spent >= 0),
                year INTEGER NOT NULL,
                month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
                UNIQUE(user_id, category, year, month),
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        category: row.get(2)?,
        amount: row.get(3)?,
        spent: row.get(4)?,
        year: row.get(5)?,
        month: row.get(6)?,
    })
}

fn map_duplicate_budget(error: rusqlite::Error, category: &str, period: BudgetPeriod) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateBudget {
            category: category.to_owned(),
            period,
        },
        error => error.into(),
    }
}
