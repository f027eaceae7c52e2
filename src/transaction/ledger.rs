use serde::Serialize;
use std::collections::HashMap;

use super::model::{Amount, Transaction};
use crate::error::{ChainError, Result};

/// Address -> balance table.
///
/// Addresses never seen before hold `default_balance`. Only the chain
/// mutates it, and every debit is checked so no balance goes negative.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    default_balance: Amount,
    balances: HashMap<String, Amount>,
}

impl Ledger {
    pub fn new(default_balance: Amount) -> Self {
        Self {
            default_balance,
            balances: HashMap::new(),
        }
    }

    pub fn default_balance(&self) -> Amount {
        self.default_balance
    }

    pub fn balance_of(&self, address: &str) -> Amount {
        self.balances
            .get(address)
            .copied()
            .unwrap_or(self.default_balance)
    }

    /// Fails with `InsufficientBalance` unless `address` holds at least `required`.
    pub fn ensure_funds(&self, address: &str, required: Amount) -> Result<()> {
        let available = self.balance_of(address);
        if available < required {
            return Err(ChainError::InsufficientBalance {
                address: address.to_string(),
                required,
                available,
            });
        }
        Ok(())
    }

    pub fn debit(&mut self, address: &str, amount: Amount) -> Result<()> {
        self.ensure_funds(address, amount)?;
        let balance = self.balance_of(address) - amount;
        self.balances.insert(address.to_string(), balance);
        Ok(())
    }

    pub fn credit(&mut self, address: &str, amount: Amount) {
        let balance = self.balance_of(address).saturating_add(amount);
        self.balances.insert(address.to_string(), balance);
    }

    /// Debit sender (amount + fee), credit receiver (amount) and the
    /// admitting party (fee). Leaves the ledger untouched on failure.
    pub fn apply(&mut self, tx: &Transaction, fee_recipient: Option<&str>) -> Result<()> {
        self.debit(&tx.sender, tx.total_debit())?;
        self.credit(&tx.receiver, tx.amount);
        if let Some(recipient) = fee_recipient.filter(|_| tx.fee > 0) {
            self.credit(recipient, tx.fee);
        }
        Ok(())
    }

    /// Number of addresses with an explicit entry.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Read-only iterator over all touched addresses.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Amount)> {
        self.balances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_address_has_default_balance() {
        let ledger = Ledger::new(100);
        assert_eq!(ledger.balance_of("nobody"), 100);
        assert!(ledger.is_empty());
    }

    #[test]
    fn debit_never_goes_negative() {
        let mut ledger = Ledger::new(100);
        let err = ledger.debit("x", 150).unwrap_err();
        assert_eq!(
            err,
            ChainError::InsufficientBalance {
                address: "x".into(),
                required: 150,
                available: 100
            }
        );
        assert_eq!(ledger.balance_of("x"), 100);
        ledger.debit("x", 100).unwrap();
        assert_eq!(ledger.balance_of("x"), 0);
    }

    #[test]
    fn apply_moves_amount_and_fee() {
        let mut ledger = Ledger::new(100);
        let tx = Transaction::new("alice", "bob", 10, 2, None).unwrap();
        ledger.apply(&tx, Some("miner")).unwrap();
        assert_eq!(ledger.balance_of("alice"), 88);
        assert_eq!(ledger.balance_of("bob"), 110);
        assert_eq!(ledger.balance_of("miner"), 102);
    }

    #[test]
    fn failed_apply_leaves_ledger_unchanged() {
        let mut ledger = Ledger::new(5);
        let tx = Transaction::new("alice", "bob", 10, 0, None).unwrap();
        assert!(ledger.apply(&tx, Some("miner")).is_err());
        assert!(ledger.is_empty());
    }
}
