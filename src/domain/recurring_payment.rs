use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type RecurringPaymentId = Uuid;
pub type PaymentHistoryId = Uuid;

/// How often a recurring payment falls due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    /// The occurrence following `date`. Month and year steps clamp to the
    /// last day of a shorter month (Jan 31 -> Feb 28/29).
    pub fn advance(&self, date: NaiveDate) -> NaiveDate {
        self.occurrence(date, 1)
    }

    /// The `n`-th occurrence counted from `anchor` (`n = 0` is the anchor).
    /// Each one is measured from the anchor, so a clamped month does not
    /// shorten the months after it.
    pub fn occurrence(&self, anchor: NaiveDate, n: u32) -> NaiveDate {
        match self {
            Frequency::Daily => anchor + Duration::days(i64::from(n)),
            Frequency::Weekly => anchor + Duration::weeks(i64::from(n)),
            Frequency::Monthly => add_months(anchor, n),
            Frequency::Yearly => add_months(anchor, n.saturating_mul(12)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let (year, month0) = (total.div_euclid(12), total.rem_euclid(12) as u32);

    // Walk back from the original day until the date exists in the target month
    (1..=date.day())
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month0 + 1, day))
        .unwrap_or(date)
}

/// Template for a payment that repeats. It is never turned into a
/// transaction automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringPayment {
    pub id: RecurringPaymentId,
    pub user_id: String,
    pub account: String,
    pub amount_cents: Cents,
    pub name: String,
    pub description: String,
    /// First (or next) date the payment is due
    pub payment_date: NaiveDate,
    /// Free-form label such as "bill" or "subscription"
    pub payment_type: String,
    pub frequency: Frequency,
    pub created_at: DateTime<Utc>,
}

impl RecurringPayment {
    /// Date of the first occurrence strictly after `date`.
    pub fn next_payment_date_after(&self, date: NaiveDate) -> NaiveDate {
        let mut n = 0;
        let mut next = self.payment_date;
        while next <= date {
            n += 1;
            next = self.frequency.occurrence(self.payment_date, n);
        }
        next
    }
}

/// Caller-supplied fields for a new recurring payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecurringPayment {
    pub amount_cents: Cents,
    pub name: String,
    pub description: String,
    pub payment_date: NaiveDate,
    pub payment_type: String,
    pub frequency: Frequency,
}

impl NewRecurringPayment {
    pub fn new(
        amount_cents: Cents,
        name: impl Into<String>,
        payment_date: NaiveDate,
        frequency: Frequency,
    ) -> Self {
        Self {
            amount_cents,
            name: name.into(),
            description: String::new(),
            payment_date,
            payment_type: String::new(),
            frequency,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_type = payment_type.into();
        self
    }

    pub(crate) fn into_recurring_payment(self, user_id: &str, account: &str) -> RecurringPayment {
        RecurringPayment {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            account: account.to_string(),
            amount_cents: self.amount_cents,
            name: self.name,
            description: self.description,
            payment_date: self.payment_date,
            payment_type: self.payment_type,
            frequency: self.frequency,
            created_at: Utc::now(),
        }
    }
}

/// Whether a recurring payment went out on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistory {
    pub id: PaymentHistoryId,
    pub payment_id: RecurringPaymentId,
    pub date: NaiveDate,
    /// true = paid, false = missed
    pub status: bool,
}

impl PaymentHistory {
    pub fn new(payment_id: RecurringPaymentId, date: NaiveDate, status: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            date,
            status,
        }
    }
}
