//! Airlines and admission votes

use crate::types::address::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Airline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AirlineStatus {
    /// Candidate collecting votes
    Unregistered,
    /// Admitted, funding below the minimum
    Registered,
    /// Admitted and funded
    Funded,
}

impl AirlineStatus {
    /// Admitted to the registry (funded or not)
    pub fn is_registered(self) -> bool {
        matches!(self, AirlineStatus::Registered | AirlineStatus::Funded)
    }
}

/// Airline registry entry
///
/// Entries are append-only: candidates that never reach the vote threshold
/// stay `Unregistered`, admitted airlines are never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airline {
    pub address: Address,
    pub name: String,
    pub status: AirlineStatus,
    /// Cumulative funding, never decreases
    pub funded_amount: Decimal,
    /// Voters backing this candidate, cleared on admission
    pub votes: BTreeSet<Address>,
    /// Admission time (Unix milliseconds)
    pub registered_at: Option<i64>,
}

impl Airline {
    /// Candidate awaiting votes
    pub fn candidate(address: Address, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            status: AirlineStatus::Unregistered,
            funded_amount: Decimal::ZERO,
            votes: BTreeSet::new(),
            registered_at: None,
        }
    }

    /// Admit the airline and consume its votes
    pub fn admit(&mut self) {
        self.status = AirlineStatus::Registered;
        self.votes.clear();
        self.registered_at = Some(chrono::Utc::now().timestamp_millis());
    }

    pub fn is_registered(&self) -> bool {
        self.status.is_registered()
    }

    pub fn is_funded(&self) -> bool {
        self.status == AirlineStatus::Funded
    }

    /// Add a vote; returns false if the voter already voted
    pub fn add_vote(&mut self, voter: Address) -> bool {
        self.votes.insert(voter)
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

/// Votes needed to admit a candidate: ceil(registered / 2)
pub fn admission_threshold(registered: usize) -> usize {
    registered.div_ceil(2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_ceiling_of_half() {
        assert_eq!(admission_threshold(1), 1);
        assert_eq!(admission_threshold(4), 2);
        assert_eq!(admission_threshold(5), 3);
        assert_eq!(admission_threshold(6), 3);
        assert_eq!(admission_threshold(7), 4);
    }

    #[test]
    fn test_vote_once_per_voter() {
        let mut candidate = Airline::candidate(Address::derive("e"), "Echo Air");
        let voter = Address::derive("a");
        assert!(candidate.add_vote(voter));
        assert!(!candidate.add_vote(voter));
        assert_eq!(candidate.vote_count(), 1);
    }

    #[test]
    fn test_admission_clears_votes() {
        let mut candidate = Airline::candidate(Address::derive("e"), "Echo Air");
        candidate.add_vote(Address::derive("a"));
        candidate.admit();
        assert!(candidate.is_registered());
        assert!(!candidate.is_funded());
        assert_eq!(candidate.vote_count(), 0);
        assert!(candidate.registered_at.is_some());
    }
}
