//! The API endpoint URIs, shared by the server router and the client.
//!
//! For endpoints that take a parameter, e.g., '/api/budgets/{budget_id}', use [format_endpoint].

/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route for registering users.
pub const USERS: &str = "/api/users";
/// The route for the logged in user's profile.
pub const ME: &str = "/api/users/me";
/// The route for changing the logged in user's password.
pub const ME_PASSWORD: &str = "/api/users/me/password";
/// The route to create and list transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to create and list budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to access a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";
/// The route to recompute how much has been spent against a budget.
pub const RECALCULATE_BUDGET: &str = "/api/budgets/{budget_id}/recalculate";
/// The route for the monthly overview of income, expenses and budgets.
pub const SUMMARY: &str = "/api/summary";
/// The route for the latest exchange rates.
pub const CURRENCY_RATES: &str = "/api/currency/rates";
/// The route for converting an amount between currencies.
pub const CURRENCY_CONVERT: &str = "/api/currency/convert";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
