//! Passenger credit accounts
//!
//! Credit is owed to passengers whose flights were delayed by the airline.
//! Key characteristics:
//! - Only settlement credits the account
//! - Withdrawal drains the full balance at once
//! - A balance found below zero freezes the account
//! - Version counter bumped on every mutation

use crate::types::address::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credit account errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CreditError {
    #[error("No credit available for {owner}")]
    NoCredit { owner: Address },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Credit balance of {owner} is negative ({balance}); account frozen")]
    InvariantViolation { owner: Address, balance: Decimal },

    #[error("Credit account {owner} is frozen")]
    AccountFrozen { owner: Address },

    #[error("Credit balance overflow")]
    Overflow,
}

/// Credit owed to one passenger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    pub owner: Address,

    /// Amount owed, never negative
    pub balance: Decimal,

    /// Set once an invariant violation is detected; blocks further mutation
    pub frozen: bool,

    /// Bumped on every mutation
    pub version: u64,

    /// Timestamp of last modification
    pub updated_at: i64,
}

impl CreditAccount {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            balance: Decimal::ZERO,
            frozen: false,
            version: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Credit a settlement payout
    pub fn credit(&mut self, amount: Decimal) -> Result<(), CreditError> {
        self.ensure_sound()?;
        if amount <= Decimal::ZERO {
            return Err(CreditError::InvalidAmount);
        }

        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(CreditError::Overflow)?;
        self.touch();
        Ok(())
    }

    /// Zero the balance and return what was owed
    pub fn drain(&mut self) -> Result<Decimal, CreditError> {
        self.ensure_sound()?;
        if self.balance.is_zero() {
            return Err(CreditError::NoCredit { owner: self.owner });
        }

        let amount = self.balance;
        self.balance = Decimal::ZERO;
        self.touch();
        Ok(amount)
    }

    /// Put back an amount drained by a withdrawal whose transfer failed
    pub fn restore(&mut self, amount: Decimal) -> Result<(), CreditError> {
        self.credit(amount)
    }

    /// Freeze the account if its balance is negative
    fn ensure_sound(&mut self) -> Result<(), CreditError> {
        if self.frozen {
            return Err(CreditError::AccountFrozen { owner: self.owner });
        }
        if self.balance < Decimal::ZERO {
            self.frozen = true;
            return Err(CreditError::InvariantViolation {
                owner: self.owner,
                balance: self.balance,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

impl std::fmt::Display for CreditAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CreditAccount(owner={}, balance={}, frozen={})",
            self.owner, self.balance, self.frozen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> CreditAccount {
        CreditAccount::new(Address::derive("passenger"))
    }

    #[test]
    fn test_new_account() {
        let acct = account();
        assert_eq!(acct.balance, Decimal::ZERO);
        assert!(!acct.frozen);
    }

    #[test]
    fn test_credit_then_drain() {
        let mut acct = account();
        acct.credit(dec!(1.5)).unwrap();
        acct.credit(dec!(0.75)).unwrap();
        assert_eq!(acct.drain().unwrap(), dec!(2.25));
        assert_eq!(acct.balance, Decimal::ZERO);
    }

    #[test]
    fn test_drain_empty_is_no_credit() {
        let mut acct = account();
        assert!(matches!(acct.drain(), Err(CreditError::NoCredit { .. })));
    }

    #[test]
    fn test_rejects_non_positive_credit() {
        let mut acct = account();
        assert_eq!(acct.credit(Decimal::ZERO), Err(CreditError::InvalidAmount));
        assert_eq!(acct.credit(dec!(-1)), Err(CreditError::InvalidAmount));
    }

    #[test]
    fn test_negative_balance_freezes_account() {
        let mut acct = account();
        acct.balance = dec!(-1);

        assert!(matches!(
            acct.credit(dec!(1)),
            Err(CreditError::InvariantViolation { .. })
        ));
        assert!(acct.frozen);
        assert!(matches!(acct.drain(), Err(CreditError::AccountFrozen { .. })));
    }

    #[test]
    fn test_version_increment() {
        let mut acct = account();
        let initial = acct.version;
        acct.credit(dec!(1)).unwrap();
        acct.drain().unwrap();
        assert_eq!(acct.version, initial + 2);
    }
}
