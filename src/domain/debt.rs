use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, TransactionId};

pub type DebtId = Uuid;

/// Category assigned to every transaction created by a debt payment.
pub const DEBT_PAYMENT_CATEGORY: &str = "Debt";

/// A principal owed by a user on one of their accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    pub user_id: String,
    pub account: String,
    pub name: String,
    /// Principal in cents (always positive)
    pub total_owing: Cents,
    pub created_at: DateTime<Utc>,
}

impl Debt {
    pub fn new(
        user_id: impl Into<String>,
        account: impl Into<String>,
        name: impl Into<String>,
        total_owing: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            account: account.into(),
            name: name.into(),
            total_owing,
            created_at: Utc::now(),
        }
    }

    /// Name given to the transaction recorded for a payment on this debt.
    pub fn payment_name(&self) -> String {
        format!("balance payment for debt {}", self.id)
    }
}

/// Join record tying one payment transaction to the debt it pays down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtPayment {
    pub id: Uuid,
    pub debt_id: DebtId,
    pub transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
}

impl DebtPayment {
    pub fn new(debt_id: DebtId, transaction_id: TransactionId) -> Self {
        Self {
            id: Uuid::new_v4(),
            debt_id,
            transaction_id,
            created_at: Utc::now(),
        }
    }
}

/// A debt together with what has been paid against it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSummary {
    pub debt: Debt,
    /// Negated sum of the linked payment transactions; zero with no payments
    pub total_paid: Cents,
}

impl DebtSummary {
    pub fn remaining(&self) -> Cents {
        self.debt.total_owing - self.total_paid
    }

    pub fn is_settled(&self) -> bool {
        self.remaining() <= 0
    }
}
