//! Keeps each budget's `spent` total in step with the expenses linked to it.
//!
//! A budget's `spent` is the sum of the amounts of the EXPENSE transactions
//! linked to it. Creating a budget or moving it to another category or month
//! computes the sum from scratch. Transaction writes adjust it incrementally:
//! the old contribution is taken off, clamped at zero, and the new one is
//! added. Totals are rounded to cents after every adjustment.
//!
//! Every function here expects to run inside the same SQL transaction as the
//! write it accompanies, so a failure leaves no partial adjustment behind.

use rusqlite::{Connection, OptionalExtension};

use crate::{
    BudgetPeriod, Error, NewTransaction, Transaction, TransactionType,
    budget::Budget,
    database_id::BudgetId,
    money::clamp_spent,
    user::UserID,
};

/// Work out which budget a new or edited transaction should be linked to.
///
/// 1. An explicit budget ID is used as is, for any transaction type, as long
///    as the budget belongs to the user.
/// 2. An expense without one is linked to the user's budget with the same
///    category, ignoring case, in the month of the transaction's date.
/// 3. Anything else is left unlinked.
///
/// # Errors
/// Returns [Error::InvalidBudget] if the explicit budget ID does not refer to one of the user's
/// budgets.
pub(crate) fn resolve_budget(
    user_id: UserID,
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<Option<BudgetId>, Error> {
    if let Some(budget_id) = new_transaction.budget_id {
        let is_owned_by_user = connection
            .query_row(
                "SELECT 1 FROM budget WHERE id = ?1 AND user_id = ?2",
                (budget_id, user_id.as_i64()),
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if !is_owned_by_user {
            return Err(Error::InvalidBudget(budget_id));
        }

        return Ok(Some(budget_id));
    }

    match new_transaction.transaction_type {
        TransactionType::Expense => find_matching_budget(
            user_id,
            &new_transaction.category,
            BudgetPeriod::containing(new_transaction.date),
            connection,
        ),
        TransactionType::Income => Ok(None),
    }
}

/// Find the user's budget for `category`, ignoring case, in `period`.
pub(crate) fn find_matching_budget(
    user_id: UserID,
    category: &str,
    period: BudgetPeriod,
    connection: &Connection,
) -> Result<Option<BudgetId>, Error> {
    connection
        .query_row(
            "SELECT id FROM budget
             WHERE user_id = ?1 AND category = ?2 COLLATE NOCASE AND year = ?3 AND month = ?4",
            (user_id.as_i64(), category.trim(), period.year, period.month),
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
}

/// Add `transaction`'s amount to the spent total of its budget.
///
/// Does nothing for income or unlinked transactions.
pub(crate) fn add_contribution(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<(), Error> {
    match transaction.contribution() {
        Some((budget_id, amount)) => adjust_spent(budget_id, amount, connection),
        None => Ok(()),
    }
}

/// Take `transaction`'s amount off the spent total of its budget, stopping at zero.
///
/// Does nothing for income or unlinked transactions.
pub(crate) fn remove_contribution(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<(), Error> {
    match transaction.contribution() {
        Some((budget_id, amount)) => adjust_spent(budget_id, -amount, connection),
        None => Ok(()),
    }
}

/// Add `delta` to a budget's spent total, clamping at zero and rounding to cents.
fn adjust_spent(budget_id: BudgetId, delta: f64, connection: &Connection) -> Result<(), Error> {
    let spent: Option<f64> = connection
        .query_row(
            "SELECT spent FROM budget WHERE id = ?1",
            (budget_id,),
            |row| row.get(0),
        )
        .optional()?;

    // The budget may have been deleted since the transaction was linked.
    let Some(spent) = spent else {
        tracing::warn!("Tried to adjust spent of missing budget {budget_id}");
        return Ok(());
    };

    let new_spent = clamp_spent(spent + delta);
    if spent + delta < 0.0 {
        tracing::debug!("Clamped spent of budget {budget_id} at zero ({spent} + {delta})");
    }

    connection.execute(
        "UPDATE budget SET spent = ?1 WHERE id = ?2",
        (new_spent, budget_id),
    )?;

    Ok(())
}

/// Sum the expenses linked to a budget and store the sum as its spent total.
///
/// Returns the new total.
pub(crate) fn recompute_spent(budget_id: BudgetId, connection: &Connection) -> Result<f64, Error> {
    let total: f64 = connection.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\"
         WHERE budget_id = ?1 AND type = 'EXPENSE'",
        (budget_id,),
        |row| row.get(0),
    )?;
    let spent = clamp_spent(total);

    connection.execute(
        "UPDATE budget SET spent = ?1 WHERE id = ?2",
        (spent, budget_id),
    )?;

    Ok(spent)
}

/// Unlink every transaction from a budget.
pub(crate) fn release_transactions(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE \"transaction\" SET budget_id = NULL WHERE budget_id = ?1",
            (budget_id,),
        )
        .map_err(Error::from)
}

/// Link the owner's unlinked expenses in the budget's category and month to the budget.
///
/// Returns the number of transactions that were linked. The caller is
/// responsible for recomputing the budget's spent total afterwards.
pub(crate) fn adopt_matching_transactions(
    budget: &Budget,
    connection: &Connection,
) -> Result<usize, Error> {
    let (start, end) = budget.period().date_bounds();

    let adopted = connection.execute(
        "UPDATE \"transaction\" SET budget_id = ?1
         WHERE user_id = ?2 AND budget_id IS NULL AND type = 'EXPENSE'
           AND category = ?3 COLLATE NOCASE AND date >= ?4 AND date < ?5",
        (
            budget.id,
            budget.user_id.as_i64(),
            &budget.category,
            start,
            end,
        ),
    )?;

    if adopted > 0 {
        tracing::debug!("Budget {} adopted {adopted} transactions", budget.id);
    }

    Ok(adopted)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        Budget, BudgetPeriod, Error, NewBudget, NewTransaction,
        budget::{create_budget, delete_budget, get_budget, recalculate_budget, update_budget},
        test_utils::{insert_test_user, test_connection},
        transaction::{create_transaction, delete_transaction, get_transaction, update_transaction},
        user::UserID,
    };

    const TODAY: Date = date!(2025 - 06 - 30);

    fn setup() -> (Connection, UserID) {
        let conn = test_connection();
        let user = insert_test_user(&conn, "test@example.com");

        (conn, user.id)
    }

    fn june() -> BudgetPeriod {
        BudgetPeriod::new(2025, 6).unwrap()
    }

    fn budget(user_id: UserID, category: &str, period: BudgetPeriod, conn: &Connection) -> Budget {
        create_budget(user_id, NewBudget::new(category, 500.0, period), conn).unwrap()
    }

    #[track_caller]
    fn assert_spent(user_id: UserID, budget: &Budget, want: f64, conn: &Connection) {
        let got = get_budget(user_id, budget.id, conn).unwrap().spent;
        assert_eq!(got, want, "got spent {got}, want {want}");
    }

    #[test]
    fn expense_is_linked_by_category_ignoring_case() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);

        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(50.0, "FOOD", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.budget_id, Some(food.id));
        assert_spent(user_id, &food, 50.0, &conn);
    }

    #[test]
    fn expense_in_other_month_is_not_linked() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);

        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(50.0, "Food", date!(2025 - 05 - 31)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.budget_id, None);
        assert_spent(user_id, &food, 0.0, &conn);
    }

    #[test]
    fn income_is_not_linked_by_category() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);

        let transaction = create_transaction(
            user_id,
            NewTransaction::income(50.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.budget_id, None);
        assert_spent(user_id, &food, 0.0, &conn);
    }

    #[test]
    fn explicit_budget_links_income_without_counting_it() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);

        let transaction = create_transaction(
            user_id,
            NewTransaction::income(50.0, "Refund", date!(2025 - 06 - 10)).budget_id(Some(food.id)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.budget_id, Some(food.id));
        assert_spent(user_id, &food, 0.0, &conn);
    }

    #[test]
    fn explicit_budget_overrides_category_match() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let fun = budget(user_id, "Fun", june(), &conn);

        create_transaction(
            user_id,
            NewTransaction::expense(20.0, "Food", date!(2025 - 06 - 10)).budget_id(Some(fun.id)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_spent(user_id, &food, 0.0, &conn);
        assert_spent(user_id, &fun, 20.0, &conn);
    }

    #[test]
    fn other_users_budget_is_invalid() {
        let (conn, user_id) = setup();
        let other_user = insert_test_user(&conn, "other@example.com");
        let theirs = budget(other_user.id, "Food", june(), &conn);

        let result = create_transaction(
            user_id,
            NewTransaction::expense(20.0, "Food", date!(2025 - 06 - 10)).budget_id(Some(theirs.id)),
            TODAY,
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidBudget(theirs.id)));
        assert_spent(other_user.id, &theirs, 0.0, &conn);
    }

    #[test]
    fn update_moves_contribution_between_budgets() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let fun = budget(user_id, "Fun", june(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        let updated = update_transaction(
            user_id,
            transaction.id,
            NewTransaction::expense(45.5, "Fun", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_eq!(updated.budget_id, Some(fun.id));
        assert_spent(user_id, &food, 0.0, &conn);
        assert_spent(user_id, &fun, 45.5, &conn);
    }

    #[test]
    fn update_amount_adjusts_same_budget() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let date = date!(2025 - 06 - 10);
        create_transaction(user_id, NewTransaction::expense(10.0, "Food", date), TODAY, &conn)
            .unwrap();
        let transaction =
            create_transaction(user_id, NewTransaction::expense(40.0, "Food", date), TODAY, &conn)
                .unwrap();

        update_transaction(
            user_id,
            transaction.id,
            NewTransaction::expense(25.0, "Food", date),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_spent(user_id, &food, 35.0, &conn);
    }

    #[test]
    fn update_expense_to_income_removes_contribution() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let date = date!(2025 - 06 - 10);
        let transaction =
            create_transaction(user_id, NewTransaction::expense(40.0, "Food", date), TODAY, &conn)
                .unwrap();

        let updated = update_transaction(
            user_id,
            transaction.id,
            NewTransaction::income(40.0, "Food", date),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_eq!(updated.budget_id, None);
        assert_spent(user_id, &food, 0.0, &conn);
    }

    #[test]
    fn update_to_other_month_moves_contribution() {
        let (conn, user_id) = setup();
        let june_food = budget(user_id, "Food", june(), &conn);
        let may_food = budget(user_id, "Food", BudgetPeriod::new(2025, 5).unwrap(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        update_transaction(
            user_id,
            transaction.id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 05 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        assert_spent(user_id, &june_food, 0.0, &conn);
        assert_spent(user_id, &may_food, 40.0, &conn);
    }

    #[test]
    fn delete_removes_contribution() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        delete_transaction(user_id, transaction.id, &conn).unwrap();

        assert_spent(user_id, &food, 0.0, &conn);
    }

    #[test]
    fn spent_is_clamped_at_zero() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();
        // Simulate drift, e.g. from an external edit to the database.
        conn.execute("UPDATE budget SET spent = 10 WHERE id = ?1", (food.id,))
            .unwrap();

        delete_transaction(user_id, transaction.id, &conn).unwrap();

        assert_spent(user_id, &food, 0.0, &conn);
    }

    #[test]
    fn spent_clamped_from_just_below_zero_is_positive_zero() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();
        conn.execute("UPDATE budget SET spent = 39.996 WHERE id = ?1", (food.id,))
            .unwrap();

        delete_transaction(user_id, transaction.id, &conn).unwrap();

        let spent = get_budget(user_id, food.id, &conn).unwrap().spent;
        assert_eq!(spent, 0.0);
        assert!(spent.is_sign_positive(), "got spent {spent}");
        assert_eq!(serde_json::to_string(&spent).unwrap(), "0.0");
    }

    #[test]
    fn spent_is_rounded_to_cents() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        for _ in 0..3 {
            create_transaction(
                user_id,
                NewTransaction::expense(0.1, "Food", date!(2025 - 06 - 10)),
                TODAY,
                &conn,
            )
            .unwrap();
        }

        assert_spent(user_id, &food, 0.3, &conn);
    }

    #[test]
    fn failed_update_leaves_spent_unchanged() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        let result = update_transaction(
            user_id,
            transaction.id,
            NewTransaction::expense(40.0, "Food", date!(2025 - 06 - 10)).budget_id(Some(999)),
            TODAY,
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidBudget(999)));
        assert_spent(user_id, &food, 40.0, &conn);
        assert_eq!(
            get_transaction(user_id, transaction.id, &conn)
                .unwrap()
                .budget_id,
            Some(food.id)
        );
    }

    #[test]
    fn new_budget_adopts_unlinked_expenses() {
        let (conn, user_id) = setup();
        for (amount, category, date) in [
            (10.0, "Food", date!(2025 - 06 - 01)),
            (15.25, "food", date!(2025 - 06 - 30)),
            (99.0, "Food", date!(2025 - 07 - 01)),
            (5.0, "Fun", date!(2025 - 06 - 15)),
        ] {
            create_transaction(
                user_id,
                NewTransaction::expense(amount, category, date),
                date!(2025 - 07 - 01),
                &conn,
            )
            .unwrap();
        }
        create_transaction(
            user_id,
            NewTransaction::income(1000.0, "Food", date!(2025 - 06 - 15)),
            TODAY,
            &conn,
        )
        .unwrap();

        let food = budget(user_id, "Food", june(), &conn);

        assert_eq!(food.spent, 25.25);
        assert_spent(user_id, &food, 25.25, &conn);
    }

    #[test]
    fn moving_budget_relinks_transactions() {
        let (conn, user_id) = setup();
        let date = date!(2025 - 06 - 10);
        let food = budget(user_id, "Food", june(), &conn);
        let lunch =
            create_transaction(user_id, NewTransaction::expense(12.0, "Food", date), TODAY, &conn)
                .unwrap();
        let movie =
            create_transaction(user_id, NewTransaction::expense(20.0, "Fun", date), TODAY, &conn)
                .unwrap();

        let moved =
            update_budget(user_id, food.id, NewBudget::new("Fun", 100.0, june()), &conn).unwrap();

        assert_eq!(moved.spent, 20.0);
        assert_eq!(get_transaction(user_id, lunch.id, &conn).unwrap().budget_id, None);
        assert_eq!(
            get_transaction(user_id, movie.id, &conn).unwrap().budget_id,
            Some(food.id)
        );
    }

    #[test]
    fn changing_only_amount_keeps_links() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        create_transaction(
            user_id,
            NewTransaction::expense(12.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        let updated =
            update_budget(user_id, food.id, NewBudget::new("food", 50.0, june()), &conn).unwrap();

        assert_eq!(updated.amount, 50.0);
        assert_eq!(updated.spent, 12.0);
    }

    #[test]
    fn deleting_budget_unlinks_transactions() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        let transaction = create_transaction(
            user_id,
            NewTransaction::expense(12.0, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();

        delete_budget(user_id, food.id, &conn).unwrap();

        let transaction = get_transaction(user_id, transaction.id, &conn).unwrap();
        assert_eq!(transaction.budget_id, None);
        assert_eq!(transaction.amount, 12.0);
    }

    #[test]
    fn recalculate_repairs_drift() {
        let (conn, user_id) = setup();
        let food = budget(user_id, "Food", june(), &conn);
        create_transaction(
            user_id,
            NewTransaction::expense(12.5, "Food", date!(2025 - 06 - 10)),
            TODAY,
            &conn,
        )
        .unwrap();
        conn.execute("UPDATE budget SET spent = 999 WHERE id = ?1", (food.id,))
            .unwrap();

        let recalculated = recalculate_budget(user_id, food.id, &conn).unwrap();

        assert_eq!(recalculated.spent, 12.5);
        assert_spent(user_id, &food, 12.5, &conn);
    }
}
