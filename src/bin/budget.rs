use std::{error::Error, io, process::exit};

use clap::{Args as ClapArgs, Parser, Subcommand};
use time::{Date, OffsetDateTime, macros::format_description};
use tracing_subscriber::EnvFilter;

use budget_sync::{
    BudgetId, BudgetPeriod, BudgetSummary, CurrencyCode, NewBudget, NewTransaction, Transaction,
    TransactionId,
    client::{ApiClient, CachedClient, ClientError, Fetched, LocalCache, Source},
};

/// A command line client for the budget_sync server.
///
/// Lists of transactions and budgets are cached in a local file so that they
/// show up straight away, and refreshed from the server on every run.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The base URL of the server.
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    url: String,

    /// The email of your account.
    #[arg(long, env = "BUDGET_EMAIL")]
    email: String,

    /// Your password. You are asked for it when it is not set.
    #[arg(long, env = "BUDGET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// File path to the local cache database.
    #[arg(long, default_value = "budget_cache.db")]
    cache_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Register {
        /// The name shown in the app. Defaults to the first part of your email.
        #[arg(long, default_value = "")]
        name: String,
        /// Your preferred currency, e.g. NZD. Defaults to USD.
        #[arg(long)]
        currency: Option<CurrencyCode>,
    },
    /// List, add or delete transactions.
    #[command(subcommand)]
    Transactions(TransactionCommand),
    /// List, add or delete budgets.
    #[command(subcommand)]
    Budgets(BudgetCommand),
    /// Show the income, expenses and budgets of a month.
    Summary(PeriodArg),
    /// Convert an amount between currencies.
    Convert {
        /// The amount to convert.
        amount: f64,
        /// The currency to convert to, e.g. EUR.
        to: CurrencyCode,
        /// The currency to convert from. Defaults to your preferred currency.
        #[arg(long)]
        from: Option<CurrencyCode>,
    },
    /// Log out and forget everything cached for your account.
    LogOut,
}

#[derive(Subcommand, Debug)]
enum TransactionCommand {
    /// List the transactions of a month.
    List(PeriodArg),
    /// Record an expense or income.
    Add {
        /// The amount of money, always positive.
        #[arg(long)]
        amount: f64,
        /// What the money was spent on or where it came from.
        #[arg(long)]
        category: String,
        /// Record income instead of an expense.
        #[arg(long)]
        income: bool,
        /// A short note about the transaction.
        #[arg(long, default_value = "")]
        description: String,
        /// When the transaction happened as YYYY-MM-DD. Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
        /// Count the transaction towards this budget instead of the one for its category.
        #[arg(long)]
        budget_id: Option<BudgetId>,
    },
    /// Delete a transaction.
    Delete {
        /// The ID of the transaction.
        id: TransactionId,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    /// List the budgets of a month.
    List(PeriodArg),
    /// Set a spending limit for a category.
    Add {
        /// The category of expenses the budget covers.
        #[arg(long)]
        category: String,
        /// The most you want to spend.
        #[arg(long)]
        amount: f64,
        #[command(flatten)]
        period: PeriodArg,
    },
    /// Delete a budget.
    Delete {
        /// The ID of the budget.
        id: BudgetId,
    },
    /// Recompute how much has been spent against a budget.
    Recalculate {
        /// The ID of the budget.
        id: BudgetId,
    },
}

#[derive(ClapArgs, Debug)]
struct PeriodArg {
    /// The month as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    period: Option<BudgetPeriod>,
}

impl PeriodArg {
    fn resolve(&self) -> BudgetPeriod {
        self.period
            .unwrap_or_else(|| BudgetPeriod::containing(today()))
    }
}

fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

fn parse_date(string: &str) -> Result<Date, time::error::Parse> {
    Date::parse(string, format_description!("[year]-[month]-[day]"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(error) = run(args).await {
        print_error(error);
        exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    let api = ApiClient::new(&args.url)?;
    let cache = LocalCache::open(&args.cache_path)?;
    let mut client = CachedClient::new(api, cache);

    if let Command::Register { name, currency } = &args.command {
        let user = client
            .register(&args.email, &password, name, currency.as_ref())
            .await?;
        println!("Registered {} ({}, {}).", user.name, user.email, user.currency);
        return Ok(());
    }

    client.log_in(&args.email, &password).await?;

    match args.command {
        Command::Register { .. } => {}
        Command::Transactions(command) => run_transaction_command(&client, command).await?,
        Command::Budgets(command) => run_budget_command(&client, command).await?,
        Command::Summary(period) => {
            let summary = client.api().summary(period.resolve()).await?;
            println!("{}-{:02}", summary.year, summary.month);
            println!("  Income:   {:>10.2}", summary.income);
            println!("  Expenses: {:>10.2}", summary.expenses);
            println!("  Net:      {:>10.2}", summary.net);
            println!(
                "  Budgets:  {:>10.2} of {:.2} spent",
                summary.budget_spent, summary.budgeted
            );
            print_budgets(&summary.budgets);
        }
        Command::Convert { amount, to, from } => {
            let conversion = client.api().convert(amount, from.as_ref(), &to).await?;
            println!(
                "{:.2} {} = {:.2} {} (rate {})",
                conversion.amount,
                conversion.from,
                conversion.converted,
                conversion.to,
                conversion.rate
            );
        }
        Command::LogOut => {
            client.log_out().await?;
            println!("Logged out.");
        }
    }

    Ok(())
}

async fn run_transaction_command(
    client: &CachedClient<ApiClient>,
    command: TransactionCommand,
) -> Result<(), Box<dyn Error>> {
    match command {
        TransactionCommand::List(period) => {
            let period = period.resolve();
            let fetched = client.transactions(period).await?;
            print_transactions(period, &fetched);
            wait_for_refresh(fetched).await;
        }
        TransactionCommand::Add {
            amount,
            category,
            income,
            description,
            date,
            budget_id,
        } => {
            let date = date.unwrap_or_else(today);
            let new_transaction = if income {
                NewTransaction::income(amount, &category, date)
            } else {
                NewTransaction::expense(amount, &category, date)
            }
            .description(&description)
            .budget_id(budget_id);

            let transaction = client.create_transaction(&new_transaction).await?;
            println!("Added transaction {}.", transaction.id);
        }
        TransactionCommand::Delete { id } => {
            client.delete_transaction(id).await?;
            println!("Deleted transaction {id}.");
        }
    }

    Ok(())
}

async fn run_budget_command(
    client: &CachedClient<ApiClient>,
    command: BudgetCommand,
) -> Result<(), Box<dyn Error>> {
    match command {
        BudgetCommand::List(period) => {
            let period = period.resolve();
            let fetched = client.budgets(period).await?;
            println!("Budgets for {period}{}", source_note(fetched.source));
            print_budgets(&fetched.data);
            wait_for_refresh(fetched).await;
        }
        BudgetCommand::Add {
            category,
            amount,
            period,
        } => {
            let budget = client
                .create_budget(&NewBudget::new(&category, amount, period.resolve()))
                .await?;
            println!(
                "Added budget {} for {} in {}.",
                budget.budget.id,
                budget.budget.category,
                budget.budget.period()
            );
        }
        BudgetCommand::Delete { id } => {
            client.delete_budget(id).await?;
            println!("Deleted budget {id}.");
        }
        BudgetCommand::Recalculate { id } => {
            let budget = client.recalculate_budget(id).await?;
            print_budgets(&[budget]);
        }
    }

    Ok(())
}

fn source_note(source: Source) -> &'static str {
    match source {
        Source::Cache => " (cached, refreshing)",
        Source::Network => "",
    }
}

fn print_transactions(period: BudgetPeriod, fetched: &Fetched<Vec<Transaction>>) {
    println!("Transactions for {period}{}", source_note(fetched.source));

    if fetched.data.is_empty() {
        println!("  none");
        return;
    }

    for transaction in &fetched.data {
        let budget = transaction
            .budget_id
            .map(|id| format!(" [budget {id}]"))
            .unwrap_or_default();

        println!(
            "  {:>5}  {}  {:<7}  {:>10.2}  {}{}  {}",
            transaction.id,
            transaction.date,
            transaction.transaction_type,
            transaction.amount,
            transaction.category,
            budget,
            transaction.description
        );
    }
}

fn print_budgets(budgets: &[BudgetSummary]) {
    if budgets.is_empty() {
        println!("  none");
        return;
    }

    for summary in budgets {
        let flag = if summary.over_budget { "  OVER" } else { "" };

        println!(
            "  {:>5}  {:<20}  {:>10.2} / {:>10.2}  ({:.2} left){}",
            summary.budget.id,
            summary.budget.category,
            summary.budget.spent,
            summary.budget.amount,
            summary.remaining,
            flag
        );
    }
}

/// Let the background refresh finish so the next run sees fresh data.
async fn wait_for_refresh<T>(fetched: Fetched<T>) {
    let Some(refresh) = fetched.refresh else {
        return;
    };

    if let Err(error) = refresh.await {
        tracing::warn!("Background refresh did not finish: {error}");
    }
}

fn print_error(error: Box<dyn Error>) {
    let message = match error.downcast_ref::<ClientError>() {
        Some(ClientError::Api { message, .. }) => message.clone(),
        _ => error.to_string(),
    };

    eprintln!("\x1b[31;1m{}\x1b[0m", capitalise_first_char(&message));
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
