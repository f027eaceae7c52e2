pub mod ledger;
pub mod model;

pub use ledger::Ledger;
pub use model::{Amount, Transaction, checked_amount};
