mod account;
mod debt;
mod ledger;
mod money;
mod recurring_payment;
mod transaction;

pub use account::*;
pub use debt::*;
pub use ledger::*;
pub use money::*;
pub use recurring_payment::*;
pub use transaction::*;
