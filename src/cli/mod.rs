use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::application::{AppError, LedgerService};
use crate::config::{parse_timeout_ms, LedgerConfig};
use crate::domain::{
    format_cents, parse_cents, DebtSummary, Frequency, NewRecurringPayment, NewTransaction,
    PaymentHistory, RecurringPayment, Transaction,
};

/// Tally - bookkeeping ledger that never lets a balance go negative
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Record transactions, debts and recurring payments per user and account")]
#[command(version)]
pub struct Cli {
    /// Database file path (defaults to $TALLY_DATABASE, then tally.db)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Store timeout in milliseconds (defaults to $TALLY_STORE_TIMEOUT_MS, then 3000)
    #[arg(long, value_parser = parse_timeout_arg)]
    pub timeout_ms: Option<std::time::Duration>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// The (user, account) pair an operation acts on
#[derive(Args, Clone)]
pub struct Owner {
    /// User identifier
    #[arg(short, long)]
    pub user: String,

    /// Account name
    #[arg(short, long)]
    pub account: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Show the balance of an account
    Balance {
        #[command(flatten)]
        owner: Owner,
    },

    /// Record a transaction (negative amounts are debits)
    Post {
        #[command(flatten)]
        owner: Owner,

        /// Signed amount (e.g., "100", "-30.50")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Transaction name
        #[arg(short, long)]
        name: String,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Category label
        #[arg(short, long, default_value = "")]
        category: String,
    },

    /// List the transactions of an account
    Transactions {
        #[command(flatten)]
        owner: Owner,
    },

    /// Category commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Debt commands
    #[command(subcommand)]
    Debt(DebtCommands),

    /// Recurring payment commands
    #[command(subcommand)]
    Recurring(RecurringCommands),
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create an account owned by a user
    Create {
        /// Owning user
        #[arg(short, long)]
        user: String,

        /// Account name
        name: String,
    },

    /// Share an existing account with another user
    Share {
        /// Current member of the account
        #[arg(long)]
        owner: String,

        /// Account name
        name: String,

        /// User to add
        #[arg(long)]
        with: String,
    },

    /// List the accounts of a user
    List {
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List the categories in use
    List {
        #[command(flatten)]
        owner: Owner,
    },

    /// Relabel a transaction
    Set {
        #[command(flatten)]
        owner: Owner,

        /// Transaction ID
        transaction_id: String,

        /// New category
        category: String,
    },

    /// List the transactions in a category
    Show {
        #[command(flatten)]
        owner: Owner,

        /// Category label
        category: String,
    },
}

#[derive(Subcommand)]
pub enum DebtCommands {
    /// Record a new debt
    Create {
        #[command(flatten)]
        owner: Owner,

        /// Debt name
        name: String,

        /// Principal owed (e.g., "200" or "200.00")
        #[arg(long)]
        owing: String,
    },

    /// List debts with what has been paid
    List {
        #[command(flatten)]
        owner: Owner,
    },

    /// Show one debt
    Show {
        #[command(flatten)]
        owner: Owner,

        /// Debt ID
        id: String,
    },

    /// Pay an amount off a debt from the account balance
    Pay {
        #[command(flatten)]
        owner: Owner,

        /// Debt ID
        id: String,

        /// Amount to pay
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },

    /// List the payment transactions of a debt
    Payments {
        #[command(flatten)]
        owner: Owner,

        /// Debt ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RecurringCommands {
    /// Add a recurring payment template
    Add {
        #[command(flatten)]
        owner: Owner,

        /// Payment name
        name: String,

        /// Signed amount
        #[arg(long, allow_hyphen_values = true)]
        amount: String,

        /// First payment date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Frequency: daily, weekly, monthly, yearly
        #[arg(short, long, default_value = "monthly")]
        frequency: String,

        /// Payment type label (e.g., "bill", "subscription")
        #[arg(short = 't', long = "type", default_value = "")]
        payment_type: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List the recurring payments of an account
    List {
        #[command(flatten)]
        owner: Owner,
    },

    /// List every recurring payment
    All,

    /// Show the history of a recurring payment
    History {
        /// Recurring payment ID
        id: String,
    },

    /// Record whether a recurring payment went out
    Record {
        /// Recurring payment ID
        id: String,

        /// Date of the occurrence (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Record the occurrence as missed rather than paid
        #[arg(long)]
        missed: bool,
    },
}

fn parse_timeout_arg(value: &str) -> Result<std::time::Duration, String> {
    parse_timeout_ms(value).ok_or_else(|| format!("'{}' is not a positive number of milliseconds", value))
}

impl Cli {
    /// Resolve the ledger configuration: flags override the environment.
    pub fn config(&self) -> LedgerConfig {
        let mut config = LedgerConfig::from_env();
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            config.store_timeout = timeout;
        }
        config
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();
        let json = self.json;

        match self.command {
            Commands::Init => {
                LedgerService::init(&config).await?;
                println!("Database initialized: {}", config.database.display());
            }

            Commands::Account(cmd) => {
                let service = LedgerService::connect(&config).await?;
                run_account_command(&service, cmd, json).await?;
            }

            Commands::Balance { owner } => {
                let service = LedgerService::connect(&config).await?;
                let balance = service.get_balance(&owner.user, &owner.account).await?;
                if json {
                    print_json(&serde_json::json!({
                        "user": owner.user,
                        "account": owner.account,
                        "balance_cents": balance,
                    }))?;
                } else {
                    println!("{}/{}: {}", owner.user, owner.account, format_cents(balance));
                }
            }

            Commands::Post {
                owner,
                amount,
                name,
                description,
                category,
            } => {
                let service = LedgerService::connect(&config).await?;
                let amount_cents = parse_cents(&amount).map_err(AppError::from)?;
                let new = NewTransaction::new(amount_cents, name)
                    .with_description(description)
                    .with_category(category);

                let posted = service
                    .post_transaction(&owner.user, &owner.account, new)
                    .await?;

                if json {
                    print_json(&posted)?;
                } else {
                    println!(
                        "Recorded {} ({}), balance now {}",
                        format_cents(posted.transaction.amount_cents),
                        posted.transaction.id,
                        format_cents(posted.balance)
                    );
                }
            }

            Commands::Transactions { owner } => {
                let service = LedgerService::connect(&config).await?;
                let transactions = service
                    .list_transactions(&owner.user, &owner.account)
                    .await?;
                print_transactions(&transactions, json)?;
            }

            Commands::Category(cmd) => {
                let service = LedgerService::connect(&config).await?;
                run_category_command(&service, cmd, json).await?;
            }

            Commands::Debt(cmd) => {
                let service = LedgerService::connect(&config).await?;
                run_debt_command(&service, cmd, json).await?;
            }

            Commands::Recurring(cmd) => {
                let service = LedgerService::connect(&config).await?;
                run_recurring_command(&service, cmd, json).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(
    service: &LedgerService,
    cmd: AccountCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        AccountCommands::Create { user, name } => {
            let account = service.create_account(&user, &name).await?;
            if json {
                print_json(&account)?;
            } else {
                println!("Created account: {} (owner {})", account.name, account.user_id);
            }
        }

        AccountCommands::Share { owner, name, with } => {
            let account = service.share_account(&owner, &name, &with).await?;
            if json {
                print_json(&account)?;
            } else {
                println!("Shared account {} with {}", account.name, account.user_id);
            }
        }

        AccountCommands::List { user } => {
            let accounts = service.list_accounts(&user).await?;
            if json {
                print_json(&accounts)?;
            } else if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<24} {:<8}", "NAME", "PRIMARY");
                println!("{}", "-".repeat(33));
                for account in accounts {
                    println!(
                        "{:<24} {:<8}",
                        account.name,
                        if account.is_primary { "yes" } else { "no" }
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_category_command(
    service: &LedgerService,
    cmd: CategoryCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        CategoryCommands::List { owner } => {
            let categories = service
                .list_categories(&owner.user, &owner.account)
                .await?;
            if json {
                print_json(&categories)?;
            } else if categories.is_empty() {
                println!("No categories found.");
            } else {
                for category in categories {
                    println!("{}", category);
                }
            }
        }

        CategoryCommands::Set {
            owner,
            transaction_id,
            category,
        } => {
            let id = parse_id(&transaction_id, "transaction")?;
            let transaction = service
                .set_transaction_category(&owner.user, &owner.account, id, &category)
                .await?;
            if json {
                print_json(&transaction)?;
            } else {
                println!("Transaction {} is now in '{}'", transaction.id, transaction.category);
            }
        }

        CategoryCommands::Show { owner, category } => {
            let transactions = service
                .list_transactions_in_category(&owner.user, &owner.account, &category)
                .await?;
            print_transactions(&transactions, json)?;
        }
    }
    Ok(())
}

async fn run_debt_command(service: &LedgerService, cmd: DebtCommands, json: bool) -> Result<()> {
    match cmd {
        DebtCommands::Create { owner, name, owing } => {
            let total_owing = parse_cents(&owing).map_err(AppError::from)?;
            let debt = service
                .create_debt(&owner.user, &owner.account, &name, total_owing)
                .await?;
            if json {
                print_json(&debt)?;
            } else {
                println!(
                    "Created debt: {} owing {} ({})",
                    debt.name,
                    format_cents(debt.total_owing),
                    debt.id
                );
            }
        }

        DebtCommands::List { owner } => {
            let debts = service.list_debts(&owner.user, &owner.account).await?;
            print_debts(&debts, json)?;
        }

        DebtCommands::Show { owner, id } => {
            let id = parse_id(&id, "debt")?;
            let summary = service.get_debt(&owner.user, &owner.account, id).await?;
            print_debts(std::slice::from_ref(&summary), json)?;
        }

        DebtCommands::Pay { owner, id, amount } => {
            let id = parse_id(&id, "debt")?;
            let amount = parse_cents(&amount).map_err(AppError::from)?;
            let summary = service
                .pay_debt(&owner.user, &owner.account, id, amount)
                .await?;
            if json {
                print_json(&summary)?;
            } else {
                println!(
                    "Paid {} off {}: {} of {} paid, {} remaining",
                    format_cents(amount.saturating_abs()),
                    summary.debt.name,
                    format_cents(summary.total_paid),
                    format_cents(summary.debt.total_owing),
                    format_cents(summary.remaining())
                );
            }
        }

        DebtCommands::Payments { owner, id } => {
            let id = parse_id(&id, "debt")?;
            let payments = service
                .list_debt_payments(&owner.user, &owner.account, id)
                .await?;
            print_transactions(&payments, json)?;
        }
    }
    Ok(())
}

async fn run_recurring_command(
    service: &LedgerService,
    cmd: RecurringCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        RecurringCommands::Add {
            owner,
            name,
            amount,
            date,
            frequency,
            payment_type,
            description,
        } => {
            let amount_cents = parse_cents(&amount).map_err(AppError::from)?;
            let payment_date = parse_date(&date)?;
            let frequency = Frequency::from_str(&frequency).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid frequency '{}'. Valid values: daily, weekly, monthly, yearly",
                    frequency
                )
            })?;

            let new = NewRecurringPayment::new(amount_cents, name, payment_date, frequency)
                .with_payment_type(payment_type)
                .with_description(description);
            let payment = service
                .create_recurring_payment(&owner.user, &owner.account, new)
                .await?;

            if json {
                print_json(&payment)?;
            } else {
                println!(
                    "Created recurring payment: {} {} {} from {} ({})",
                    payment.name,
                    format_cents(payment.amount_cents),
                    payment.frequency,
                    payment.payment_date,
                    payment.id
                );
            }
        }

        RecurringCommands::List { owner } => {
            let payments = service
                .list_recurring_payments(&owner.user, &owner.account)
                .await?;
            print_recurring_payments(&payments, json)?;
        }

        RecurringCommands::All => {
            let payments = service.list_all_recurring_payments().await?;
            print_recurring_payments(&payments, json)?;
        }

        RecurringCommands::History { id } => {
            let id = parse_id(&id, "recurring payment")?;
            let history = service.get_payment_history(id).await?;
            print_history(&history, json)?;
        }

        RecurringCommands::Record { id, date, missed } => {
            let id = parse_id(&id, "recurring payment")?;
            let date = match date {
                Some(date) => parse_date(&date)?,
                None => Utc::now().date_naive(),
            };
            let entry = service.record_payment_history(id, date, !missed).await?;
            if json {
                print_json(&entry)?;
            } else {
                println!(
                    "Recorded {} on {}",
                    if entry.status { "payment" } else { "missed payment" },
                    entry.date
                );
            }
        }
    }
    Ok(())
}

fn parse_id(input: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("Invalid {} ID '{}' (expected UUID)", what, input))
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", input))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_transactions(transactions: &[Transaction], json: bool) -> Result<()> {
    if json {
        return print_json(transactions);
    }
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<36} {:>12} {:<28} {:<14}",
        "ID", "AMOUNT", "NAME", "CATEGORY"
    );
    println!("{}", "-".repeat(93));
    for t in transactions {
        println!(
            "{:<36} {:>12} {:<28} {:<14}",
            t.id,
            format_cents(t.amount_cents),
            truncate(&t.name, 28),
            t.category
        );
    }
    Ok(())
}

fn print_debts(debts: &[DebtSummary], json: bool) -> Result<()> {
    if json {
        return print_json(debts);
    }
    if debts.is_empty() {
        println!("No debts found.");
        return Ok(());
    }

    println!(
        "{:<36} {:<20} {:>12} {:>12} {:>12}",
        "ID", "NAME", "OWING", "PAID", "REMAINING"
    );
    println!("{}", "-".repeat(96));
    for summary in debts {
        println!(
            "{:<36} {:<20} {:>12} {:>12} {:>12}",
            summary.debt.id,
            truncate(&summary.debt.name, 20),
            format_cents(summary.debt.total_owing),
            format_cents(summary.total_paid),
            format_cents(summary.remaining())
        );
    }
    Ok(())
}

fn print_recurring_payments(payments: &[RecurringPayment], json: bool) -> Result<()> {
    if json {
        return print_json(payments);
    }
    if payments.is_empty() {
        println!("No recurring payments found.");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    println!(
        "{:<36} {:<20} {:>12} {:<8} {:<10} {:<10}",
        "ID", "NAME", "AMOUNT", "EVERY", "NEXT", "TYPE"
    );
    println!("{}", "-".repeat(101));
    for p in payments {
        println!(
            "{:<36} {:<20} {:>12} {:<8} {:<10} {:<10}",
            p.id,
            truncate(&p.name, 20),
            format_cents(p.amount_cents),
            p.frequency,
            p.next_payment_date_after(today),
            p.payment_type
        );
    }
    Ok(())
}

fn print_history(history: &[PaymentHistory], json: bool) -> Result<()> {
    if json {
        return print_json(history);
    }
    if history.is_empty() {
        println!("No payment history found.");
        return Ok(());
    }

    for entry in history {
        println!(
            "{}  {}",
            entry.date,
            if entry.status { "paid" } else { "missed" }
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
