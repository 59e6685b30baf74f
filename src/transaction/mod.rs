//! Income and expense records, and the endpoints for managing them.

mod core;
mod endpoints;
mod query;

pub use core::{
    NewTransaction, Transaction, TransactionType, count_transactions, create_transaction,
    create_transaction_table, delete_transaction, get_transaction, update_transaction,
};
pub(crate) use core::{MAX_DESCRIPTION_LENGTH, SELECT_COLUMNS, map_transaction_row};
pub use endpoints::{
    TransactionState, create_transaction_endpoint, delete_transaction_endpoint,
    get_transaction_endpoint, list_transactions_endpoint, update_transaction_endpoint,
};
pub use query::{TransactionFilter, TransactionListQuery, list_transactions};
