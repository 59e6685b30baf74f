use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use budget_sync::{
    BudgetPeriod, CurrencyCode, NewBudget, NewTransaction, NewUser, PasswordHash,
    ValidatedPassword, create_budget, create_transaction, create_user, initialize_db,
    parse_email,
};

/// A utility for creating a test database for the REST API server of budget_sync.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "test";

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user {DEMO_EMAIL} with the password \"{DEMO_PASSWORD}\"...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(DEMO_PASSWORD),
        PasswordHash::DEFAULT_COST,
    )?;

    let user = create_user(
        NewUser {
            email: parse_email(DEMO_EMAIL)?,
            name: "Demo".to_owned(),
            currency: CurrencyCode::default(),
            password_hash,
        },
        &conn,
    )?;

    let today = OffsetDateTime::now_utc().date();
    let this_month = BudgetPeriod::containing(today);
    let last_month = BudgetPeriod::containing(this_month.first_day() - Duration::days(1));

    println!("Creating budgets for {last_month} and {this_month}...");

    for period in [last_month, this_month] {
        for (category, amount) in [("Groceries", 400.0), ("Eating Out", 150.0), ("Transport", 120.0)] {
            create_budget(user.id, NewBudget::new(category, amount, period), &conn)?;
        }
    }

    println!("Creating transactions...");

    let transactions = [
        NewTransaction::income(3200.0, "Salary", last_month.first_day()),
        NewTransaction::expense(82.35, "Groceries", last_month.first_day() + Duration::days(2))
            .description("Weekly shop"),
        NewTransaction::expense(64.0, "Eating Out", last_month.first_day() + Duration::days(5))
            .description("Dinner with friends"),
        NewTransaction::expense(120.5, "Groceries", last_month.first_day() + Duration::days(9)),
        NewTransaction::expense(45.0, "Transport", last_month.first_day() + Duration::days(12))
            .description("Bus pass"),
        NewTransaction::expense(19.99, "Subscriptions", last_month.first_day() + Duration::days(14)),
        NewTransaction::income(3200.0, "Salary", this_month.first_day()),
        NewTransaction::expense(76.8, "groceries", this_month.first_day())
            .description("Weekly shop"),
        NewTransaction::expense(12.5, "Eating Out", this_month.first_day())
            .description("Lunch"),
    ];

    for new_transaction in transactions {
        create_transaction(user.id, new_transaction, today, &conn)?;
    }

    println!("Success!");

    Ok(())
}
