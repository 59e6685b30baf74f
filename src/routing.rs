//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    auth::{auth_guard, post_log_in, post_log_out},
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
        list_budgets_endpoint, recalculate_budget_endpoint, update_budget_endpoint,
    },
    currency::{convert_endpoint, get_rates_endpoint},
    endpoints,
    not_found::get_404_not_found,
    summary::get_summary_endpoint,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
    user::{change_password, delete_me, get_me, register_user, update_me},
};

/// Return a router with all the app's routes.
///
/// Every route except registration, log in and log out needs a valid auth
/// cookie. Requests without one get 401 Unauthorized.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(endpoints::USERS, post(register_user));

    let protected_routes = Router::new()
        .route(endpoints::ME, get(get_me).put(update_me).delete(delete_me))
        .route(endpoints::ME_PASSWORD, put(change_password))
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            get(list_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint)
                .put(update_budget_endpoint)
                .delete(delete_budget_endpoint),
        )
        .route(
            endpoints::RECALCULATE_BUDGET,
            post(recalculate_budget_endpoint),
        )
        .route(endpoints::SUMMARY, get(get_summary_endpoint))
        .route(endpoints::CURRENCY_RATES, get(get_rates_endpoint))
        .route(endpoints::CURRENCY_CONVERT, get(convert_endpoint))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}
