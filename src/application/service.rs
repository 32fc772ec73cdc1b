use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument, warn};

use crate::config::LedgerConfig;
use crate::domain::{
    apply_amount, debt_payment_amount, Account, BalanceError, Cents, Debt, DebtId, DebtPayment,
    DebtSummary, NewRecurringPayment, NewTransaction, PaymentHistory, RecurringPayment,
    RecurringPaymentId, Transaction, TransactionId, DEBT_PAYMENT_CATEGORY,
};
use crate::storage::Repository;

use super::{AppError, KeyedLocks};

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, API, etc.).
///
/// Every call is bounded by the configured store timeout. Writes that change a
/// balance are serialised per (user, account) and checked in the same
/// statement that performs them, so a balance can never be driven negative.
pub struct LedgerService {
    repo: Repository,
    locks: KeyedLocks,
    store_timeout: Duration,
}

/// A recorded transaction and the balance it produced.
#[derive(Debug, Clone, Serialize)]
pub struct PostedTransaction {
    pub transaction: Transaction,
    pub balance: Cents,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository, store_timeout: Duration) -> Self {
        Self {
            repo,
            locks: KeyedLocks::new(),
            store_timeout,
        }
    }

    /// Create the database if needed and apply the schema.
    pub async fn init(config: &LedgerConfig) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo, config.store_timeout))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config, false).await?;
        Ok(Self::new(repo, config.store_timeout))
    }

    /// Run a store interaction under the configured deadline. On expiry the
    /// future is dropped, which rolls back any open store transaction.
    async fn bounded<T, F>(&self, operation: &'static str, work: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.store_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "store operation timed out"
                );
                Err(AppError::Timeout {
                    operation,
                    after: self.store_timeout,
                })
            }
        }
    }

    // ========================
    // Account operations
    // ========================

    /// Create an account with `user_id` as its primary member.
    pub async fn create_account(&self, user_id: &str, name: &str) -> Result<Account, AppError> {
        self.bounded("create account", async {
            let account = Account::new(name, user_id);
            if !self.repo.save_account(&account).await? {
                return Err(AppError::AccountAlreadyExists {
                    user: user_id.to_string(),
                    account: name.to_string(),
                });
            }
            info!(user = user_id, account = name, "created account");
            Ok(account)
        })
        .await
    }

    /// Give `new_user` shared (non-primary) access to `owner`'s account.
    pub async fn share_account(
        &self,
        owner: &str,
        name: &str,
        new_user: &str,
    ) -> Result<Account, AppError> {
        self.bounded("share account", async {
            let account = self.repo.get_account(name, owner).await?.ok_or_else(|| {
                AppError::AccountNotFound {
                    user: owner.to_string(),
                    account: name.to_string(),
                }
            })?;

            let shared = account.shared_with(new_user);
            if !self.repo.save_account(&shared).await? {
                return Err(AppError::AccountAlreadyExists {
                    user: new_user.to_string(),
                    account: name.to_string(),
                });
            }
            info!(owner, user = new_user, account = name, "shared account");
            Ok(shared)
        })
        .await
    }

    /// List every account `user_id` belongs to.
    pub async fn list_accounts(&self, user_id: &str) -> Result<Vec<Account>, AppError> {
        self.bounded("list accounts", async {
            Ok(self.repo.list_accounts(user_id).await?)
        })
        .await
    }

    // ========================
    // Balance operations
    // ========================

    /// Current balance of a (user, account) pair. No transactions is zero.
    pub async fn get_balance(&self, user_id: &str, account: &str) -> Result<Cents, AppError> {
        self.bounded("get balance", async {
            let balance = self.repo.compute_balance(user_id, account).await?;
            debug!(user = user_id, account, balance, "read balance");
            Ok(balance)
        })
        .await
    }

    /// Record a transaction, refusing it if the balance would drop below zero.
    #[instrument(
        name = "ledger.post_transaction",
        skip(self, new),
        fields(amount = new.amount_cents),
        err
    )]
    pub async fn post_transaction(
        &self,
        user_id: &str,
        account: &str,
        new: NewTransaction,
    ) -> Result<PostedTransaction, AppError> {
        if new.amount_cents == 0 {
            return Err(AppError::InvalidAmount(
                "Transaction amount must not be zero".to_string(),
            ));
        }
        let transaction = new.into_transaction(user_id, account);

        self.bounded("post transaction", async {
            let _guard = self.locks.lock(user_id, account).await;
            let mut tx = self.repo.begin().await?;

            let balance = self.write_covered(&mut tx, &transaction).await?;
            tx.commit().await.context("Failed to commit transaction")?;

            info!(
                user = user_id,
                account,
                transaction_id = %transaction.id,
                amount = transaction.amount_cents,
                balance,
                "recorded transaction"
            );
            Ok(PostedTransaction {
                transaction,
                balance,
            })
        })
        .await
    }

    /// Insert `transaction` if the balance covers it and return the new balance.
    /// Must run inside the caller's store transaction while holding the
    /// (user, account) lock.
    async fn write_covered(
        &self,
        conn: &mut SqliteConnection,
        transaction: &Transaction,
    ) -> Result<Cents, AppError> {
        let user_id = transaction.user_id.as_str();
        let account = transaction.account.as_str();

        if self
            .repo
            .insert_transaction_if_covered(conn, transaction)
            .await?
        {
            return Ok(self.repo.compute_balance_in(conn, user_id, account).await?);
        }

        let balance = self.repo.compute_balance_in(conn, user_id, account).await?;
        let err = match apply_amount(balance, transaction.amount_cents) {
            Err(BalanceError::Overflow { .. }) => {
                AppError::InvalidAmount(format!("{} overflows the balance", transaction.amount_cents))
            }
            _ => AppError::InsufficientBalance {
                user: user_id.to_string(),
                account: account.to_string(),
                balance,
                amount: transaction.amount_cents,
            },
        };
        warn!(
            user = user_id,
            account,
            balance,
            amount = transaction.amount_cents,
            "rejected transaction"
        );
        Err(err)
    }

    // ========================
    // Transaction & category operations
    // ========================

    /// All transactions of a (user, account) pair, oldest first.
    pub async fn list_transactions(
        &self,
        user_id: &str,
        account: &str,
    ) -> Result<Vec<Transaction>, AppError> {
        self.bounded("list transactions", async {
            Ok(self.repo.list_transactions(user_id, account).await?)
        })
        .await
    }

    /// Distinct category labels in use on a (user, account) pair.
    pub async fn list_categories(
        &self,
        user_id: &str,
        account: &str,
    ) -> Result<Vec<String>, AppError> {
        self.bounded("list categories", async {
            Ok(self.repo.list_categories(user_id, account).await?)
        })
        .await
    }

    /// Relabel one of the pair's own transactions. A transaction belonging to
    /// anyone else is reported as not found.
    pub async fn set_transaction_category(
        &self,
        user_id: &str,
        account: &str,
        transaction_id: TransactionId,
        category: &str,
    ) -> Result<Transaction, AppError> {
        self.bounded("set transaction category", async {
            let updated = self
                .repo
                .update_transaction_category(user_id, account, transaction_id, category)
                .await?;
            if !updated {
                return Err(AppError::TransactionNotFound(transaction_id));
            }

            info!(user = user_id, account, %transaction_id, category, "relabelled transaction");
            self.repo
                .get_transaction(user_id, account, transaction_id)
                .await?
                .ok_or(AppError::TransactionNotFound(transaction_id))
        })
        .await
    }

    pub async fn list_transactions_in_category(
        &self,
        user_id: &str,
        account: &str,
        category: &str,
    ) -> Result<Vec<Transaction>, AppError> {
        self.bounded("list transactions in category", async {
            Ok(self
                .repo
                .list_transactions_in_category(user_id, account, category)
                .await?)
        })
        .await
    }

    // ========================
    // Debt operations
    // ========================

    /// Record a new debt with a positive principal.
    pub async fn create_debt(
        &self,
        user_id: &str,
        account: &str,
        name: &str,
        total_owing: Cents,
    ) -> Result<Debt, AppError> {
        if total_owing <= 0 {
            return Err(AppError::InvalidAmount(
                "Debt principal must be positive".to_string(),
            ));
        }

        self.bounded("create debt", async {
            let debt = Debt::new(user_id, account, name, total_owing);
            self.repo.save_debt(&debt).await?;
            info!(user = user_id, account, debt_id = %debt.id, total_owing, "created debt");
            Ok(debt)
        })
        .await
    }

    pub async fn get_debt(
        &self,
        user_id: &str,
        account: &str,
        debt_id: DebtId,
    ) -> Result<DebtSummary, AppError> {
        self.bounded("get debt", async {
            self.repo
                .get_debt_summary(user_id, account, debt_id)
                .await?
                .ok_or(AppError::DebtNotFound(debt_id))
        })
        .await
    }

    /// Every debt of a (user, account) pair, including those with no payments yet.
    pub async fn list_debts(
        &self,
        user_id: &str,
        account: &str,
    ) -> Result<Vec<DebtSummary>, AppError> {
        self.bounded("list debts", async {
            Ok(self.repo.list_debt_summaries(user_id, account).await?)
        })
        .await
    }

    /// The payment transactions recorded against a debt.
    pub async fn list_debt_payments(
        &self,
        user_id: &str,
        account: &str,
        debt_id: DebtId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.bounded("list debt payments", async {
            if self
                .repo
                .get_debt_summary(user_id, account, debt_id)
                .await?
                .is_none()
            {
                return Err(AppError::DebtNotFound(debt_id));
            }
            Ok(self.repo.list_debt_payment_transactions(debt_id).await?)
        })
        .await
    }

    /// Pay `amount` off a debt from the account balance.
    ///
    /// The payment is stored as a debit of `-|amount|` and linked to the debt in
    /// the same store transaction: if either write fails, neither is kept.
    #[instrument(name = "ledger.pay_debt", skip(self), err)]
    pub async fn pay_debt(
        &self,
        user_id: &str,
        account: &str,
        debt_id: DebtId,
        amount: Cents,
    ) -> Result<DebtSummary, AppError> {
        let amount = debt_payment_amount(amount);
        if amount == 0 {
            return Err(AppError::InvalidAmount(
                "Debt payment must not be zero".to_string(),
            ));
        }

        self.bounded("pay debt", async {
            let summary = self
                .repo
                .get_debt_summary(user_id, account, debt_id)
                .await?
                .ok_or(AppError::DebtNotFound(debt_id))?;

            let transaction = NewTransaction::new(amount, summary.debt.payment_name())
                .with_category(DEBT_PAYMENT_CATEGORY)
                .into_transaction(user_id, account);

            let balance = {
                let _guard = self.locks.lock(user_id, account).await;
                let mut tx = self.repo.begin().await?;

                let balance = self.write_covered(&mut tx, &transaction).await?;
                self.repo
                    .insert_debt_payment(&mut tx, &DebtPayment::new(debt_id, transaction.id))
                    .await?;
                tx.commit().await.context("Failed to commit debt payment")?;
                balance
            };

            info!(
                user = user_id,
                account,
                %debt_id,
                transaction_id = %transaction.id,
                amount,
                balance,
                "paid debt"
            );

            self.repo
                .get_debt_summary(user_id, account, debt_id)
                .await?
                .ok_or(AppError::DebtNotFound(debt_id))
        })
        .await
    }

    // ========================
    // Recurring payment operations
    // ========================

    /// Store a recurring payment template. Nothing is ever executed from it.
    pub async fn create_recurring_payment(
        &self,
        user_id: &str,
        account: &str,
        new: NewRecurringPayment,
    ) -> Result<RecurringPayment, AppError> {
        if new.amount_cents == 0 {
            return Err(AppError::InvalidAmount(
                "Recurring payment amount must not be zero".to_string(),
            ));
        }
        let payment = new.into_recurring_payment(user_id, account);

        self.bounded("create recurring payment", async {
            self.repo.save_recurring_payment(&payment).await?;
            info!(
                user = user_id,
                account,
                payment_id = %payment.id,
                frequency = %payment.frequency,
                "created recurring payment"
            );
            Ok(payment)
        })
        .await
    }

    pub async fn list_recurring_payments(
        &self,
        user_id: &str,
        account: &str,
    ) -> Result<Vec<RecurringPayment>, AppError> {
        self.bounded("list recurring payments", async {
            Ok(self.repo.list_recurring_payments(user_id, account).await?)
        })
        .await
    }

    /// Recurring payments of every user and account.
    pub async fn list_all_recurring_payments(&self) -> Result<Vec<RecurringPayment>, AppError> {
        self.bounded("list all recurring payments", async {
            Ok(self.repo.list_all_recurring_payments().await?)
        })
        .await
    }

    /// History of a recurring payment, oldest first. No history is an empty list.
    pub async fn get_payment_history(
        &self,
        payment_id: RecurringPaymentId,
    ) -> Result<Vec<PaymentHistory>, AppError> {
        self.bounded("get payment history", async {
            Ok(self.repo.list_payment_history(payment_id).await?)
        })
        .await
    }

    /// Note whether a recurring payment went out (`status = true`) or was
    /// missed on `date`.
    pub async fn record_payment_history(
        &self,
        payment_id: RecurringPaymentId,
        date: NaiveDate,
        status: bool,
    ) -> Result<PaymentHistory, AppError> {
        self.bounded("record payment history", async {
            if self.repo.get_recurring_payment(payment_id).await?.is_none() {
                return Err(AppError::RecurringPaymentNotFound(payment_id));
            }

            let entry = PaymentHistory::new(payment_id, date, status);
            self.repo.save_payment_history(&entry).await?;
            info!(%payment_id, %date, status, "recorded payment history");
            Ok(entry)
        })
        .await
    }
}
