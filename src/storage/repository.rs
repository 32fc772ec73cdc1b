use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, Cents, Debt, DebtId, DebtPayment, DebtSummary, Frequency, PaymentHistory,
    RecurringPayment, RecurringPaymentId, Transaction, TransactionId,
};

use super::MIGRATION_001_INITIAL;

const DATE_FORMAT: &str = "%Y-%m-%d";

const TRANSACTION_COLUMNS: &str =
    "id, user_id, account, amount_cents, name, description, category, recorded_at";

const RECURRING_PAYMENT_COLUMNS: &str = "id, user_id, account, amount_cents, name, description, payment_date, payment_type, frequency, created_at";

/// Debt rows joined with their payments. Debts without payments survive the
/// left joins and report zero paid.
const DEBT_SUMMARY_SELECT: &str = r#"
    SELECT
        d.id, d.user_id, d.account, d.name, d.total_owing, d.created_at,
        -COALESCE(SUM(t.amount_cents), 0) AS total_paid
    FROM debts d
    LEFT JOIN debt_payments p ON p.debt_id = d.id
    LEFT JOIN transactions t ON t.id = p.transaction_id
"#;

/// Repository for persisting and querying the ledger.
///
/// Methods taking a `&mut SqliteConnection` run on a caller-owned
/// transaction so several writes can commit or roll back together.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database named by `config`, creating the file when `create` is set.
    pub async fn connect(config: &LedgerConfig, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            // Outlive the service deadline so a stalled write surfaces as a timeout
            .busy_timeout(config.store_timeout * 2);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(config.store_timeout)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to database {}", config.database.display())
            })?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Every statement is idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(config: &LedgerConfig) -> Result<Self> {
        let repo = Self::connect(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a store transaction. Dropping it without commit rolls back.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a membership. Returns false when `account.user_id` already has
    /// an account with that name.
    pub async fn save_account(&self, account: &Account) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, name, user_id, is_primary, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (name, user_id) DO NOTHING
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(&account.user_id)
        .bind(account.is_primary)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get `user_id`'s membership of the account called `name`.
    pub async fn get_account(&self, name: &str, user_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, user_id, is_primary, created_at
            FROM accounts
            WHERE name = ? AND user_id = ?
            "#,
        )
        .bind(name)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn list_accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, user_id, is_primary, created_at
            FROM accounts
            WHERE user_id = ?
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            name: row.get("name"),
            user_id: row.get("user_id"),
            is_primary: row.get::<i32, _>("is_primary") != 0,
            created_at: parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Insert `transaction` only if it keeps its (user, account) balance
    /// between zero and `i64::MAX`. The balance check and the insert are one
    /// statement.
    ///
    /// Returns false, having written nothing, when the balance is not enough
    /// or the new balance would not fit.
    pub async fn insert_transaction_if_covered(
        &self,
        conn: &mut SqliteConnection,
        transaction: &Transaction,
    ) -> Result<bool> {
        // SQLite turns an overflowing integer sum into a REAL, so the bounds
        // are compared without adding the amount to the balance.
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, account, amount_cents, name, description, category, recorded_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?
            FROM (
                SELECT COALESCE(SUM(amount_cents), 0) AS balance
                FROM transactions
                WHERE user_id = ? AND account = ?
            )
            WHERE ? >= -balance AND ? <= 9223372036854775807 - balance
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(&transaction.user_id)
        .bind(&transaction.account)
        .bind(transaction.amount_cents)
        .bind(&transaction.name)
        .bind(&transaction.description)
        .bind(&transaction.category)
        .bind(transaction.recorded_at.to_rfc3339())
        .bind(&transaction.user_id)
        .bind(&transaction.account)
        .bind(transaction.amount_cents)
        .bind(transaction.amount_cents)
        .execute(&mut *conn)
        .await
        .context("Failed to save transaction")?;

        Ok(result.rows_affected() == 1)
    }

    /// Compute the balance of a (user, account) pair. No rows is a zero balance.
    pub async fn compute_balance(&self, user_id: &str, account: &str) -> Result<Cents> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        self.compute_balance_in(&mut conn, user_id, account).await
    }

    /// Same as [`Repository::compute_balance`], inside a caller-owned transaction.
    pub async fn compute_balance_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        account: &str,
    ) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) AS balance
            FROM transactions
            WHERE user_id = ? AND account = ?
            "#,
        )
        .bind(user_id)
        .bind(account)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to compute balance")?;

        Ok(row.get("balance"))
    }

    pub async fn get_transaction(
        &self,
        user_id: &str,
        account: &str,
        id: TransactionId,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ? AND user_id = ? AND account = ?"
        ))
        .bind(id.to_string())
        .bind(user_id)
        .bind(account)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// List all transactions of a (user, account) pair in the order they were recorded.
    pub async fn list_transactions(&self, user_id: &str, account: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = ? AND account = ? ORDER BY sequence"
        ))
        .bind(user_id)
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    pub async fn list_transactions_in_category(
        &self,
        user_id: &str,
        account: &str,
        category: &str,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = ? AND account = ? AND category = ? ORDER BY sequence"
        ))
        .bind(user_id)
        .bind(account)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions by category")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Distinct non-empty category labels used by a (user, account) pair.
    pub async fn list_categories(&self, user_id: &str, account: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT category
            FROM transactions
            WHERE user_id = ? AND account = ? AND category <> ''
            ORDER BY category
            "#,
        )
        .bind(user_id)
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list categories")?;

        Ok(rows.iter().map(|row| row.get("category")).collect())
    }

    /// Relabel a transaction owned by (user, account).
    /// Returns false when no such transaction belongs to the pair.
    pub async fn update_transaction_category(
        &self,
        user_id: &str,
        account: &str,
        id: TransactionId,
        category: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET category = ?
            WHERE id = ? AND user_id = ? AND account = ?
            "#,
        )
        .bind(category)
        .bind(id.to_string())
        .bind(user_id)
        .bind(account)
        .execute(&self.pool)
        .await
        .context("Failed to update transaction category")?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            user_id: row.get("user_id"),
            account: row.get("account"),
            amount_cents: row.get("amount_cents"),
            name: row.get("name"),
            description: row.get("description"),
            category: row.get("category"),
            recorded_at: parse_timestamp(&recorded_at_str, "recorded_at")?,
        })
    }

    // ========================
    // Debt operations
    // ========================

    pub async fn save_debt(&self, debt: &Debt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO debts (id, user_id, account, name, total_owing, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(debt.id.to_string())
        .bind(&debt.user_id)
        .bind(&debt.account)
        .bind(&debt.name)
        .bind(debt.total_owing)
        .bind(debt.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save debt")?;
        Ok(())
    }

    /// Link a payment transaction to its debt inside a caller-owned transaction.
    pub async fn insert_debt_payment(
        &self,
        conn: &mut SqliteConnection,
        payment: &DebtPayment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO debt_payments (id, debt_id, transaction_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.debt_id.to_string())
        .bind(payment.transaction_id.to_string())
        .bind(payment.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to link payment to debt")?;
        Ok(())
    }

    /// Get a debt with its payment total, scoped to its owning (user, account).
    pub async fn get_debt_summary(
        &self,
        user_id: &str,
        account: &str,
        id: DebtId,
    ) -> Result<Option<DebtSummary>> {
        let row = sqlx::query(&format!(
            "{DEBT_SUMMARY_SELECT} WHERE d.user_id = ? AND d.account = ? AND d.id = ? GROUP BY d.id"
        ))
        .bind(user_id)
        .bind(account)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch debt")?;

        row.as_ref().map(Self::row_to_debt_summary).transpose()
    }

    pub async fn list_debt_summaries(
        &self,
        user_id: &str,
        account: &str,
    ) -> Result<Vec<DebtSummary>> {
        let rows = sqlx::query(&format!(
            "{DEBT_SUMMARY_SELECT} WHERE d.user_id = ? AND d.account = ? GROUP BY d.id ORDER BY d.created_at, d.name"
        ))
        .bind(user_id)
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list debts")?;

        rows.iter().map(Self::row_to_debt_summary).collect()
    }

    /// Payment transactions linked to a debt, oldest first.
    pub async fn list_debt_payment_transactions(&self, debt_id: DebtId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.user_id, t.account, t.amount_cents, t.name, t.description, t.category, t.recorded_at
            FROM debt_payments p
            JOIN transactions t ON t.id = p.transaction_id
            WHERE p.debt_id = ?
            ORDER BY t.sequence
            "#,
        )
        .bind(debt_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list debt payments")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_debt_summary(row: &SqliteRow) -> Result<DebtSummary> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(DebtSummary {
            debt: Debt {
                id: Uuid::parse_str(&id_str).context("Invalid debt ID")?,
                user_id: row.get("user_id"),
                account: row.get("account"),
                name: row.get("name"),
                total_owing: row.get("total_owing"),
                created_at: parse_timestamp(&created_at_str, "created_at")?,
            },
            total_paid: row.get("total_paid"),
        })
    }

    // ========================
    // Recurring payment operations
    // ========================

    pub async fn save_recurring_payment(&self, payment: &RecurringPayment) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO recurring_payments ({RECURRING_PAYMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(payment.id.to_string())
        .bind(&payment.user_id)
        .bind(&payment.account)
        .bind(payment.amount_cents)
        .bind(&payment.name)
        .bind(&payment.description)
        .bind(payment.payment_date.format(DATE_FORMAT).to_string())
        .bind(&payment.payment_type)
        .bind(payment.frequency.as_str())
        .bind(payment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save recurring payment")?;
        Ok(())
    }

    pub async fn get_recurring_payment(
        &self,
        id: RecurringPaymentId,
    ) -> Result<Option<RecurringPayment>> {
        let row = sqlx::query(&format!(
            "SELECT {RECURRING_PAYMENT_COLUMNS} FROM recurring_payments WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch recurring payment")?;

        row.as_ref().map(Self::row_to_recurring_payment).transpose()
    }

    pub async fn list_recurring_payments(
        &self,
        user_id: &str,
        account: &str,
    ) -> Result<Vec<RecurringPayment>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECURRING_PAYMENT_COLUMNS} FROM recurring_payments WHERE user_id = ? AND account = ? ORDER BY payment_date, name"
        ))
        .bind(user_id)
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list recurring payments")?;

        rows.iter().map(Self::row_to_recurring_payment).collect()
    }

    /// Every recurring payment across all users and accounts.
    pub async fn list_all_recurring_payments(&self) -> Result<Vec<RecurringPayment>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECURRING_PAYMENT_COLUMNS} FROM recurring_payments ORDER BY payment_date, name"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list all recurring payments")?;

        rows.iter().map(Self::row_to_recurring_payment).collect()
    }

    fn row_to_recurring_payment(row: &SqliteRow) -> Result<RecurringPayment> {
        let id_str: String = row.get("id");
        let payment_date_str: String = row.get("payment_date");
        let frequency_str: String = row.get("frequency");
        let created_at_str: String = row.get("created_at");

        Ok(RecurringPayment {
            id: Uuid::parse_str(&id_str).context("Invalid recurring payment ID")?,
            user_id: row.get("user_id"),
            account: row.get("account"),
            amount_cents: row.get("amount_cents"),
            name: row.get("name"),
            description: row.get("description"),
            payment_date: NaiveDate::parse_from_str(&payment_date_str, DATE_FORMAT)
                .context("Invalid payment_date")?,
            payment_type: row.get("payment_type"),
            frequency: Frequency::from_str(&frequency_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid frequency: {}", frequency_str))?,
            created_at: parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Payment history operations
    // ========================

    pub async fn save_payment_history(&self, entry: &PaymentHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_history (id, payment_id, history_date, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.payment_id.to_string())
        .bind(entry.date.format(DATE_FORMAT).to_string())
        .bind(entry.status)
        .execute(&self.pool)
        .await
        .context("Failed to save payment history")?;
        Ok(())
    }

    pub async fn list_payment_history(
        &self,
        payment_id: RecurringPaymentId,
    ) -> Result<Vec<PaymentHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, payment_id, history_date, status
            FROM payment_history
            WHERE payment_id = ?
            ORDER BY history_date
            "#,
        )
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list payment history")?;

        rows.iter().map(Self::row_to_payment_history).collect()
    }

    fn row_to_payment_history(row: &SqliteRow) -> Result<PaymentHistory> {
        let id_str: String = row.get("id");
        let payment_id_str: String = row.get("payment_id");
        let date_str: String = row.get("history_date");

        Ok(PaymentHistory {
            id: Uuid::parse_str(&id_str).context("Invalid payment history ID")?,
            payment_id: Uuid::parse_str(&payment_id_str).context("Invalid recurring payment ID")?,
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .context("Invalid history_date")?,
            status: row.get::<i32, _>("status") != 0,
        })
    }
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", column))?
        .with_timezone(&Utc))
}
