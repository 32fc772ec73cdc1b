use std::time::Duration;

use thiserror::Error;

use crate::domain::{Cents, DebtId, ParseCentsError, RecurringPaymentId, TransactionId};

/// Coarse classification callers use to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown account, debt, transaction or recurring payment
    NotFound,
    /// The request is well-formed but not allowed, or its input is malformed
    InvalidOperation,
    /// The store did not answer within the configured deadline
    Timeout,
    /// Any other store error
    StoreFailure,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {account} (user {user})")]
    AccountNotFound { user: String, account: String },

    #[error("Account {account} already exists for user {user}")]
    AccountAlreadyExists { user: String, account: String },

    #[error("Debt not found: {0}")]
    DebtNotFound(DebtId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Recurring payment not found: {0}")]
    RecurringPaymentNotFound(RecurringPaymentId),

    #[error(
        "Insufficient balance in account {account} for user {user}: balance {balance}, change {amount}"
    )]
    InsufficientBalance {
        user: String,
        account: String,
        balance: Cents,
        amount: Cents,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Store operation '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AccountNotFound { .. }
            | AppError::DebtNotFound(_)
            | AppError::TransactionNotFound(_)
            | AppError::RecurringPaymentNotFound(_) => ErrorKind::NotFound,
            AppError::AccountAlreadyExists { .. }
            | AppError::InsufficientBalance { .. }
            | AppError::InvalidAmount(_) => ErrorKind::InvalidOperation,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            AppError::Database(_) => ErrorKind::StoreFailure,
        }
    }
}

impl From<ParseCentsError> for AppError {
    fn from(err: ParseCentsError) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}
