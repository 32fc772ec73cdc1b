use super::{Cents, Transaction};

/// Compute a balance from its transactions.
/// An empty slice is a zero balance.
pub fn compute_balance(transactions: &[Transaction]) -> Cents {
    transactions.iter().map(|t| t.amount_cents).sum()
}

/// Total paid off a debt given its linked payment transactions.
/// Payments are stored as debits, so this is the negated sum.
pub fn total_paid(payments: &[Transaction]) -> Cents {
    -compute_balance(payments)
}

/// Apply a signed amount to a balance, refusing to go below zero.
pub fn apply_amount(balance: Cents, amount: Cents) -> Result<Cents, BalanceError> {
    let candidate = balance
        .checked_add(amount)
        .ok_or(BalanceError::Overflow { balance, amount })?;

    if candidate < 0 {
        return Err(BalanceError::WouldGoNegative { balance, amount });
    }
    Ok(candidate)
}

/// The amount stored for a debt payment: always a debit, whatever sign the
/// caller used.
pub fn debt_payment_amount(amount: Cents) -> Cents {
    -amount.saturating_abs()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    WouldGoNegative { balance: Cents, amount: Cents },
    Overflow { balance: Cents, amount: Cents },
}

impl std::fmt::Display for BalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceError::WouldGoNegative { balance, amount } => write!(
                f,
                "applying {} cents to a balance of {} cents would make it negative",
                amount, balance
            ),
            BalanceError::Overflow { balance, amount } => write!(
                f,
                "applying {} cents to a balance of {} cents overflows",
                amount, balance
            ),
        }
    }
}

impl std::error::Error for BalanceError {}
