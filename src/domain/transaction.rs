use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type TransactionId = Uuid;

/// A single signed movement on a (user, account) balance.
/// Transactions are immutable once written; only the category can be relabelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: String,
    pub account: String,
    /// Signed amount in cents (negative = money leaving the account)
    pub amount_cents: Cents,
    pub name: String,
    pub description: String,
    /// Category label; empty when uncategorised
    pub category: String,
    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: impl Into<String>,
        account: impl Into<String>,
        amount_cents: Cents,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            account: account.into(),
            amount_cents,
            name: name.into(),
            description: String::new(),
            category: String::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn is_debit(&self) -> bool {
        self.amount_cents < 0
    }
}

/// Caller-supplied fields for a new transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount_cents: Cents,
    pub name: String,
    pub description: String,
    pub category: String,
}

impl NewTransaction {
    pub fn new(amount_cents: Cents, name: impl Into<String>) -> Self {
        Self {
            amount_cents,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub(crate) fn into_transaction(self, user_id: &str, account: &str) -> Transaction {
        Transaction::new(user_id, account, self.amount_cents, self.name)
            .with_description(self.description)
            .with_category(self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_builds_owned_row() {
        let txn = NewTransaction::new(-3000, "rent")
            .with_description("March")
            .with_category("Housing")
            .into_transaction("alice", "acct1");

        assert_eq!(txn.user_id, "alice");
        assert_eq!(txn.account, "acct1");
        assert_eq!(txn.amount_cents, -3000);
        assert_eq!(txn.name, "rent");
        assert_eq!(txn.description, "March");
        assert_eq!(txn.category, "Housing");
        assert!(txn.is_debit());
    }

    #[test]
    fn test_category_defaults_to_empty() {
        let txn = Transaction::new("alice", "acct1", 10000, "salary");
        assert_eq!(txn.category, "");
        assert_eq!(txn.description, "");
        assert!(!txn.is_debit());
    }
}
