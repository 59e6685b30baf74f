//! The monthly overview of income, expenses and budgets shown on the home screen.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, BudgetPeriod, BudgetSummary, Error,
    budget::list_budgets,
    money::round_cents,
    period::PeriodQuery,
    timezone::local_today,
    user::UserID,
};

/// Totals for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// The year of the summarised month.
    pub year: i32,
    /// The summarised month.
    pub month: u8,
    /// The total of the income transactions.
    pub income: f64,
    /// The total of the expense transactions.
    pub expenses: f64,
    /// Income minus expenses.
    pub net: f64,
    /// The total of the budget amounts.
    pub budgeted: f64,
    /// The total spent against budgets.
    pub budget_spent: f64,
    /// The month's budgets, sorted by category.
    pub budgets: Vec<BudgetSummary>,
}

/// Total up the user's transactions and budgets in `period`.
///
/// # Errors
/// Returns [Error::SqlError] if a query fails.
pub fn get_monthly_summary(
    user_id: UserID,
    period: BudgetPeriod,
    connection: &Connection,
) -> Result<MonthlySummary, Error> {
    let (start, end) = period.date_bounds();

    let (income, expenses): (f64, f64) = connection.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN type = 'INCOME' THEN amount END), 0.0),
            COALESCE(SUM(CASE WHEN type = 'EXPENSE' THEN amount END), 0.0)
         FROM \"transaction\"
         WHERE user_id = ?1 AND date >= ?2 AND date < ?3",
        (user_id.as_i64(), start, end),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let budgets: Vec<BudgetSummary> = list_budgets(user_id, period, connection)?
        .into_iter()
        .map(BudgetSummary::from)
        .collect();

    let budgeted = budgets.iter().map(|summary| summary.budget.amount).sum();
    let budget_spent = budgets.iter().map(|summary| summary.budget.spent).sum();

    Ok(MonthlySummary {
        year: period.year,
        month: period.month,
        income: round_cents(income),
        expenses: round_cents(expenses),
        net: round_cents(income - expenses),
        budgeted: round_cents(budgeted),
        budget_spent: round_cents(budget_spent),
        budgets,
    })
}

/// The state needed to build a monthly summary.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The database connection for reading transactions and budgets.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for the monthly summary, which defaults to the current month.
pub async fn get_summary_endpoint(
    State(state): State<SummaryState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MonthlySummary>, Error> {
    let period = query.resolve(local_today(&state.local_timezone)?)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_monthly_summary(user_id, period, &connection).map(Json)
}
