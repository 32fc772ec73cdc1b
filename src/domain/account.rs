use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;

/// One user's membership of a named account.
///
/// An account shared between several users has one row per user: the creator's
/// row is primary, rows added through sharing are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub user_id: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A primary membership for the user creating the account.
    pub fn new(name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            user_id: user_id.into(),
            is_primary: true,
            created_at: Utc::now(),
        }
    }

    /// A non-primary membership granting `user_id` access to this account.
    pub fn shared_with(&self, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            user_id: user_id.into(),
            is_primary: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_primary() {
        let account = Account::new("acct1", "alice");
        assert!(account.is_primary);
        assert_eq!(account.user_id, "alice");
    }

    #[test]
    fn test_shared_membership_is_not_primary() {
        let account = Account::new("acct1", "alice");
        let shared = account.shared_with("bob");

        assert_eq!(shared.name, "acct1");
        assert_eq!(shared.user_id, "bob");
        assert!(!shared.is_primary);
        assert_ne!(shared.id, account.id);
    }
}
