//! Monthly spending limits per category, and the endpoints for managing them.

mod core;
mod endpoints;
pub(crate) mod reconcile;

pub use core::{
    Budget, BudgetSummary, NewBudget, create_budget, create_budget_table, delete_budget,
    get_budget, list_budgets, recalculate_budget, update_budget,
};
pub use endpoints::{
    BudgetState, create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
    list_budgets_endpoint, recalculate_budget_endpoint, update_budget_endpoint,
};
