//! Database queries for listing a user's transactions.

use rusqlite::{Connection, ToSql};
use serde::Deserialize;

use crate::{
    BudgetPeriod, Error, Transaction, TransactionType,
    period::PeriodQuery,
    transaction::core::{SELECT_COLUMNS, map_transaction_row},
    user::UserID,
};

/// Which of a user's transactions to list.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    /// Only transactions dated within this month.
    pub period: BudgetPeriod,
    /// Only income or only expenses.
    pub transaction_type: Option<TransactionType>,
    /// Only transactions in this category, ignoring case.
    pub category: Option<String>,
}

impl TransactionFilter {
    /// Select every transaction in `period`.
    pub fn new(period: BudgetPeriod) -> Self {
        Self {
            period,
            transaction_type: None,
            category: None,
        }
    }
}

/// The query string of the transaction listing endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TransactionListQuery {
    /// The year to list, defaulting to the current year.
    pub year: Option<i32>,
    /// The month to list, defaulting to the current month.
    pub month: Option<u8>,
    /// Filter by transaction type.
    #[serde(rename = "type", default)]
    pub transaction_type: Option<TransactionType>,
    /// Filter by category.
    #[serde(default)]
    pub category: Option<String>,
}

impl TransactionListQuery {
    /// The year and month parts of the query.
    pub fn period(&self) -> PeriodQuery {
        PeriodQuery {
            year: self.year,
            month: self.month,
        }
    }
}

/// Get the user's transactions that match `filter`, newest first.
///
/// Transactions on the same date are ordered by ID, newest first, to keep the order stable
/// after updates.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn list_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let (start, end) = filter.period.date_bounds();
    let raw_user_id = user_id.as_i64();

    let mut clauses = vec!["user_id = ?", "date >= ?", "date < ?"];
    let mut params: Vec<&dyn ToSql> = vec![&raw_user_id, &start, &end];

    if let Some(transaction_type) = &filter.transaction_type {
        clauses.push("type = ?");
        params.push(transaction_type);
    }

    let category = filter.category.as_ref().map(|category| category.trim().to_owned());
    if let Some(category) = &category {
        clauses.push("category = ? COLLATE NOCASE");
        params.push(category);
    }

    let query = format!(
        "{SELECT_COLUMNS} WHERE {} ORDER BY date DESC, id DESC",
        clauses.join(" AND ")
    );

    connection
        .prepare(&query)?
        .query_map(params.as_slice(), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        BudgetPeriod, NewTransaction, TransactionType,
        test_utils::{insert_test_user, test_connection},
        transaction::create_transaction,
        user::UserID,
    };

    use super::{TransactionFilter, list_transactions};

    const TODAY: time::Date = date!(2025 - 06 - 30);

    fn setup() -> (Connection, UserID) {
        let conn = test_connection();
        let user = insert_test_user(&conn, "test@example.com");

        for new_transaction in [
            NewTransaction::expense(10.0, "Food", date!(2025 - 05 - 31)),
            NewTransaction::expense(20.0, "Food", date!(2025 - 06 - 01)),
            NewTransaction::expense(30.0, "Transport", date!(2025 - 06 - 15)),
            NewTransaction::income(40.0, "Salary", date!(2025 - 06 - 15)),
            NewTransaction::expense(50.0, "food", date!(2025 - 06 - 30)),
            NewTransaction::expense(60.0, "Food", date!(2025 - 07 - 01)),
        ] {
            let today = date!(2025 - 07 - 01);
            create_transaction(user.id, new_transaction, today, &conn).unwrap();
        }

        (conn, user.id)
    }

    fn june() -> BudgetPeriod {
        BudgetPeriod::new(2025, 6).unwrap()
    }

    #[test]
    fn lists_only_the_month_newest_first() {
        let (conn, user_id) = setup();

        let got = list_transactions(user_id, &TransactionFilter::new(june()), &conn).unwrap();

        let amounts: Vec<f64> = got.iter().map(|transaction| transaction.amount).collect();
        assert_eq!(amounts, vec![50.0, 40.0, 30.0, 20.0]);
        assert!(got.iter().all(|transaction| transaction.date <= TODAY));
    }

    #[test]
    fn filters_by_type() {
        let (conn, user_id) = setup();
        let filter = TransactionFilter {
            transaction_type: Some(TransactionType::Income),
            ..TransactionFilter::new(june())
        };

        let got = list_transactions(user_id, &filter, &conn).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].category, "Salary");
    }

    #[test]
    fn filters_by_category_ignoring_case() {
        let (conn, user_id) = setup();
        let filter = TransactionFilter {
            category: Some("FOOD".to_owned()),
            ..TransactionFilter::new(june())
        };

        let got = list_transactions(user_id, &filter, &conn).unwrap();

        let amounts: Vec<f64> = got.iter().map(|transaction| transaction.amount).collect();
        assert_eq!(amounts, vec![50.0, 20.0]);
    }

    #[test]
    fn other_users_transactions_are_hidden() {
        let (conn, _) = setup();
        let other_user = insert_test_user(&conn, "other@example.com");

        let got = list_transactions(other_user.id, &TransactionFilter::new(june()), &conn).unwrap();

        assert!(got.is_empty());
    }
}
