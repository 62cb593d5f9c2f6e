//! Airline admission, funding, and flight registration
//!
//! The first `direct_registration_limit` airlines are admitted by any funded
//! airline. From then on a registration call is a vote, and the candidate is
//! admitted once its votes reach `ceil(registered / 2)`, recomputed against
//! the registered count at the time of each vote.

use std::sync::Arc;

use flightsurety_common::{
    admission_threshold, Address, Airline, AirlineStatus, Flight, FlightKey, GovernanceError,
    Result, Role,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::ledger::events::{amount, now};
use crate::ledger::{Ledger, LedgerEvent};

/// Result of a registration call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    Admitted,
    /// Vote recorded, threshold not yet met
    Pending { votes: usize, required: usize },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Airline governance over the shared ledger
pub struct AirlineGovernance {
    ledger: Arc<Ledger>,
}

impl AirlineGovernance {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Register `candidate` directly, or vote for it once the registry is past
    /// the direct-registration limit
    #[instrument(skip_all, fields(candidate = %candidate, proposer = %proposer))]
    pub fn register_airline(
        &self,
        name: &str,
        candidate: Address,
        proposer: Address,
    ) -> Result<Admission> {
        self.ledger.guard(&proposer, Role::FundedAirline)?;

        let mut registry = self.ledger.state().airlines.write();
        if registry.status(&candidate).is_registered() {
            return Err(GovernanceError::AlreadyRegistered { airline: candidate }.into());
        }

        let registered = registry.registered_count();
        if registered < self.ledger.config().direct_registration_limit {
            registry.admit(candidate, name);
            drop(registry);
            self.record_admission(candidate, name, proposer);
            return Ok(Admission::Admitted);
        }

        let required = admission_threshold(registered);
        let votes = {
            let entry = registry.candidate(candidate, name);
            if !entry.add_vote(proposer) {
                return Err(GovernanceError::DuplicateVote {
                    voter: proposer,
                    candidate,
                }
                .into());
            }
            entry.vote_count()
        };
        self.ledger.metrics().airline_votes.inc();
        self.ledger.journal().append(LedgerEvent::AirlineVoted {
            candidate,
            voter: proposer,
            votes,
            required,
            timestamp: now(),
        });

        if votes >= required {
            // Keep the name the candidate was first proposed under
            let name = registry
                .get(&candidate)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| name.to_string());
            registry.admit(candidate, &name);
            drop(registry);
            self.record_admission(candidate, &name, proposer);
            Ok(Admission::Admitted)
        } else {
            debug!(votes, required, "Vote recorded, candidate pending");
            Ok(Admission::Pending { votes, required })
        }
    }

    fn record_admission(&self, airline: Address, name: &str, by: Address) {
        self.ledger.metrics().airlines_registered.inc();
        self.ledger.journal().append(LedgerEvent::AirlineRegistered {
            airline,
            name: name.to_string(),
            by,
            timestamp: now(),
        });
        info!(airline = %airline, name, "Airline registered");
    }

    /// Add `amount` to a registered airline's funding
    ///
    /// Until the airline is funded, a contribution that leaves the total
    /// below the minimum is rejected without changing anything.
    #[instrument(skip_all, fields(airline = %airline))]
    pub fn fund_airline(&self, airline: Address, amount_paid: Decimal) -> Result<Decimal> {
        self.ledger.guard(&airline, Role::RegisteredAirline)?;
        if amount_paid <= Decimal::ZERO {
            return Err(GovernanceError::InvalidAmount.into());
        }

        let minimum = self.ledger.config().airline_funding_minimum;
        let (total, became_funded) = {
            let mut registry = self.ledger.state().airlines.write();
            let entry = registry
                .get_mut(&airline)
                .ok_or(GovernanceError::NotFunded { airline })?;

            let total = entry.funded_amount + amount_paid;
            if !entry.is_funded() && total < minimum {
                return Err(GovernanceError::InsufficientFunds {
                    required: minimum,
                    offered: total,
                }
                .into());
            }

            entry.funded_amount = total;
            let became_funded = !entry.is_funded();
            if became_funded {
                entry.status = AirlineStatus::Funded;
            }
            (total, became_funded)
        };

        self.ledger.state().deposit(amount_paid);
        self.ledger.journal().append(LedgerEvent::AirlineFunded {
            airline,
            amount: amount(amount_paid),
            total: amount(total),
            timestamp: now(),
        });

        if became_funded {
            self.ledger.metrics().airlines_funded.inc();
            info!(total = %total, "Airline funded");
        } else {
            debug!(total = %total, "Additional funding recorded");
        }
        Ok(total)
    }

    /// Register a flight that passengers can insure
    #[instrument(skip_all, fields(airline = %airline))]
    pub fn register_flight(&self, airline: Address, flight: &str, timestamp: u64) -> Result<FlightKey> {
        self.ledger.guard(&airline, Role::FundedAirline)?;

        let key = FlightKey::new(airline, flight, timestamp);
        match self.ledger.state().flights.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(GovernanceError::FlightAlreadyRegistered { key }.into())
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Flight::new(key.clone()));
            }
        }

        self.ledger.metrics().flights_registered.inc();
        self.ledger.journal().append(LedgerEvent::FlightRegistered {
            flight: key.clone(),
            timestamp: now(),
        });
        info!(flight = %key, "Flight registered");
        Ok(key)
    }

    pub fn is_airline_registered(&self, airline: &Address) -> bool {
        self.ledger
            .state()
            .airline(airline)
            .map(|a| a.is_registered())
            .unwrap_or(false)
    }

    pub fn is_airline_funded(&self, airline: &Address) -> bool {
        self.ledger
            .state()
            .airline(airline)
            .map(|a| a.is_funded())
            .unwrap_or(false)
    }

    pub fn airline(&self, airline: &Address) -> Option<Airline> {
        self.ledger.state().airline(airline)
    }

    pub fn registered_count(&self) -> usize {
        self.ledger.state().registered_count()
    }

    /// Votes currently held by a pending candidate
    pub fn votes_for(&self, candidate: &Address) -> usize {
        self.ledger
            .state()
            .airline(candidate)
            .map(|a| a.vote_count())
            .unwrap_or(0)
    }

    pub fn flight(&self, key: &FlightKey) -> Option<Flight> {
        self.ledger.state().flight(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::{first_airline, ledger};
    use flightsurety_common::ErrorKind;
    use rust_decimal_macros::dec;

    fn governance() -> AirlineGovernance {
        AirlineGovernance::new(ledger())
    }

    fn funded(gov: &AirlineGovernance) -> Address {
        let a = first_airline();
        gov.fund_airline(a, dec!(10)).unwrap();
        a
    }

    #[test]
    fn test_unfunded_proposer_rejected() {
        let gov = governance();
        let err = gov
            .register_airline("B", Address::derive("b"), first_airline())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFunded);
        assert!(!gov.is_airline_registered(&Address::derive("b")));
    }

    #[test]
    fn test_funding_below_minimum_never_funds() {
        let gov = governance();
        let a = first_airline();

        let err = gov.fund_airline(a, dec!(9.99)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(gov.airline(&a).unwrap().funded_amount, Decimal::ZERO);
        assert!(!gov.is_airline_funded(&a));

        assert_eq!(gov.fund_airline(a, dec!(10)).unwrap(), dec!(10));
        assert!(gov.is_airline_funded(&a));

        // Funded airlines accept more without a second transition
        assert_eq!(gov.fund_airline(a, dec!(1)).unwrap(), dec!(11));
        assert_eq!(gov.ledger.metrics().airlines_funded.get(), 1);
    }

    #[test]
    fn test_non_positive_funding_rejected() {
        let gov = governance();
        let err = gov.fund_airline(first_airline(), Decimal::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn test_unregistered_airline_cannot_fund() {
        let gov = governance();
        let err = gov.fund_airline(Address::derive("x"), dec!(10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_first_four_admitted_directly() {
        let gov = governance();
        let a = funded(&gov);
        for name in ["b", "c", "d"] {
            let admission = gov.register_airline(name, Address::derive(name), a).unwrap();
            assert_eq!(admission, Admission::Admitted);
        }
        assert_eq!(gov.registered_count(), 4);

        let err = gov.register_airline("b", Address::derive("b"), a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRegistered);
    }

    #[test]
    fn test_fifth_airline_needs_majority() {
        let gov = governance();
        let a = funded(&gov);
        for name in ["b", "c", "d"] {
            gov.register_airline(name, Address::derive(name), a).unwrap();
        }
        let b = Address::derive("b");
        gov.fund_airline(b, dec!(10)).unwrap();

        let e = Address::derive("e");
        let first = gov.register_airline("E", e, a).unwrap();
        assert_eq!(first, Admission::Pending { votes: 1, required: 2 });
        assert!(!gov.is_airline_registered(&e));
        assert_eq!(gov.votes_for(&e), 1);

        let dup = gov.register_airline("E", e, a).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::DuplicateVote);

        assert!(gov.register_airline("E", e, b).unwrap().is_admitted());
        let airline = gov.airline(&e).unwrap();
        assert_eq!(airline.status, AirlineStatus::Registered);
        assert!(airline.votes.is_empty());
        assert_eq!(gov.registered_count(), 5);
    }

    #[test]
    fn test_pending_vote_threshold_follows_registry_size() {
        let gov = governance();
        let a = funded(&gov);
        for name in ["b", "c", "d"] {
            gov.register_airline(name, Address::derive(name), a).unwrap();
        }
        let (b, c) = (Address::derive("b"), Address::derive("c"));
        gov.fund_airline(b, dec!(10)).unwrap();
        gov.fund_airline(c, dec!(10)).unwrap();

        // F is proposed while four airlines are registered
        let f = Address::derive("f");
        assert_eq!(
            gov.register_airline("F", f, a).unwrap(),
            Admission::Pending { votes: 1, required: 2 }
        );

        // E's admission grows the registry to five
        let e = Address::derive("e");
        gov.register_airline("E", e, a).unwrap();
        assert!(gov.register_airline("E", e, b).unwrap().is_admitted());
        assert_eq!(gov.registered_count(), 5);

        // Two votes no longer suffice for F: ceil(5 / 2) = 3
        assert_eq!(
            gov.register_airline("F", f, b).unwrap(),
            Admission::Pending { votes: 2, required: 3 }
        );
        assert!(!gov.is_airline_registered(&f));

        assert!(gov.register_airline("F", f, c).unwrap().is_admitted());
        assert_eq!(gov.airline(&f).unwrap().name, "F");
        assert_eq!(gov.registered_count(), 6);
    }

    #[test]
    fn test_flight_registration() {
        let gov = governance();
        let a = first_airline();

        let err = gov.register_flight(a, "ND1309", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFunded);

        funded(&gov);
        let key = gov.register_flight(a, "ND1309", 1).unwrap();
        assert!(gov.flight(&key).is_some());

        let err = gov.register_flight(a, "ND1309", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FlightAlreadyRegistered);
    }
}
