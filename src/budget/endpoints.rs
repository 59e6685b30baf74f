//! Route handlers for managing budgets.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, BudgetSummary, Error, NewBudget,
    budget::{
        create_budget, delete_budget, get_budget, list_budgets, recalculate_budget, update_budget,
    },
    database_id::BudgetId,
    period::PeriodQuery,
    timezone::local_today,
    user::UserID,
};

/// The state needed to manage budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for creating a budget, responds with 201 Created and the budget.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Json(new_budget): Json<NewBudget>,
) -> Result<(StatusCode, Json<BudgetSummary>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let budget = create_budget(user_id, new_budget, &connection)?;

    Ok((StatusCode::CREATED, Json(budget.into())))
}

/// A route handler for getting one budget.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<BudgetId>,
) -> Result<Json<BudgetSummary>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_budget(user_id, budget_id, &connection).map(|budget| Json(budget.into()))
}

/// A route handler for listing the budgets in one month, which defaults to the current month.
pub async fn list_budgets_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<BudgetSummary>>, Error> {
    let period = query.resolve(local_today(&state.local_timezone)?)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let budgets = list_budgets(user_id, period, &connection)?;

    Ok(Json(budgets.into_iter().map(BudgetSummary::from).collect()))
}

/// A route handler for replacing a budget's category, amount and month.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<BudgetId>,
    Json(new_budget): Json<NewBudget>,
) -> Result<Json<BudgetSummary>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_budget(user_id, budget_id, new_budget, &connection).map(|budget| Json(budget.into()))
}

/// A route handler for deleting a budget, responds with 204 No Content.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<BudgetId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_budget(user_id, budget_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for recomputing how much has been spent against a budget.
pub async fn recalculate_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<BudgetId>,
) -> Result<Json<BudgetSummary>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    recalculate_budget(user_id, budget_id, &connection).map(|budget| Json(budget.into()))
}
