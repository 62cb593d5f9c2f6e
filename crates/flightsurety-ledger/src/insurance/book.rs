//! Policy book: purchase and settlement
//!
//! Settlement runs only for the consensus engine, identified as an
//! authorized caller. Each policy is settled under its own entry lock and
//! its credit is applied before the policy is closed, so a failure leaves
//! that policy Active with no credit.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use flightsurety_common::{
    Address, AirlineStatus, CreditAccount, CreditError, FlightKey, FlightStatus, GovernanceError,
    InsuranceError, Policy, PolicyReceipt, Result, Role, RoleResolver,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::ledger::events::{amount, now};
use crate::ledger::{Ledger, LedgerEvent};

use super::payout::PayoutGateway;

/// Outcome of settling one flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub flight: FlightKey,
    pub status: FlightStatus,
    /// Policies settled with a payout
    pub credited: usize,
    /// Policies closed without a payout
    pub expired: usize,
    pub total_payout: Decimal,
    /// Policies left Active because their credit could not be applied
    pub failed: Vec<Uuid>,
}

impl SettlementSummary {
    fn new(flight: FlightKey, status: FlightStatus) -> Self {
        Self {
            flight,
            status,
            credited: 0,
            expired: 0,
            total_payout: Decimal::ZERO,
            failed: Vec::new(),
        }
    }

    pub fn settled(&self) -> usize {
        self.credited + self.expired
    }
}

/// Sells policies and settles them against oracle outcomes
pub struct PolicyManager {
    pub(super) ledger: Arc<Ledger>,
    pub(super) gateway: Arc<dyn PayoutGateway>,
}

impl PolicyManager {
    pub fn new(ledger: Arc<Ledger>, gateway: Arc<dyn PayoutGateway>) -> Self {
        Self { ledger, gateway }
    }

    /// Insure `passenger` on a registered flight
    #[instrument(skip_all, fields(passenger = %passenger, flight = %key))]
    pub fn buy_policy(
        &self,
        passenger: Address,
        key: FlightKey,
        insured_amount: Decimal,
    ) -> Result<PolicyReceipt> {
        self.ledger.check_operational()?;

        let cap = self.ledger.config().max_insured_amount;
        if insured_amount <= Decimal::ZERO {
            return Err(InsuranceError::InvalidAmount.into());
        }
        if insured_amount > cap {
            return Err(InsuranceError::AmountExceedsCap {
                amount: insured_amount,
                cap,
            }
            .into());
        }

        let state = self.ledger.state();
        if !state.flights.contains_key(&key) {
            return Err(InsuranceError::UnknownFlight { key }.into());
        }
        if state.airline_status(&key.airline) != AirlineStatus::Funded {
            return Err(GovernanceError::NotFunded {
                airline: key.airline,
            }
            .into());
        }

        // Holding the flight entry keeps settlement from resolving it until
        // the policy is on the book
        let flight = state
            .flights
            .get(&key)
            .ok_or_else(|| InsuranceError::UnknownFlight { key: key.clone() })?;
        if flight.is_resolved() {
            return Err(InsuranceError::FlightAlreadyResolved {
                key,
                status: flight.status,
            }
            .into());
        }

        let receipt = match state.policies.entry((passenger, key.clone())) {
            Entry::Occupied(existing) => {
                let err = if existing.get().is_active() {
                    InsuranceError::DuplicatePolicy { passenger, key }
                } else {
                    InsuranceError::FlightAlreadyResolved {
                        key,
                        status: flight.status,
                    }
                };
                return Err(err.into());
            }
            Entry::Vacant(slot) => {
                let policy = Policy::new(passenger, key.clone(), insured_amount);
                let receipt = policy.receipt();
                slot.insert(policy);
                receipt
            }
        };
        state.insurees.entry(key.clone()).or_default().push(passenger);
        drop(flight);

        state.deposit(insured_amount);
        self.ledger.metrics().policies_purchased.inc();
        self.ledger.journal().append(LedgerEvent::PolicyPurchased {
            policy_id: receipt.policy_id,
            passenger,
            flight: key,
            amount: amount(insured_amount),
            timestamp: now(),
        });

        info!(policy_id = %receipt.policy_id, amount = %insured_amount, "Policy purchased");
        Ok(receipt)
    }

    /// Record the final flight status and close every Active policy on it
    #[instrument(skip_all, fields(flight = %flight, status = %outcome))]
    pub fn settle_policies(
        &self,
        caller: &Address,
        flight: &FlightKey,
        outcome: FlightStatus,
    ) -> Result<SettlementSummary> {
        self.ledger.guard(caller, Role::AuthorizedCaller)?;
        let state = self.ledger.state();

        // A flight keeps the first status it was resolved with
        let (status, first_resolution) = match state.flights.get_mut(flight) {
            Some(entry) if entry.is_resolved() => {
                if entry.status != outcome {
                    warn!(recorded = %entry.status, "Flight already resolved with another status");
                }
                (entry.status, false)
            }
            Some(mut entry) => {
                entry.resolve(outcome);
                (outcome, true)
            }
            None => (outcome, true),
        };
        if first_resolution {
            self.ledger.journal().append(LedgerEvent::FlightStatusFinalized {
                flight: flight.clone(),
                status,
                timestamp: now(),
            });
        }

        let passengers = state
            .insurees
            .get(flight)
            .map(|p| p.clone())
            .unwrap_or_default();
        let multiplier = self.ledger.config().payout_multiplier;
        let mut summary = SettlementSummary::new(flight.clone(), status);

        for passenger in passengers {
            let Some(mut policy) = state.policies.get_mut(&(passenger, flight.clone())) else {
                continue;
            };
            if !policy.is_active() {
                continue;
            }

            let payout = policy.payout_for(status, multiplier);
            if payout.is_zero() {
                policy.close(status, Decimal::ZERO);
                summary.expired += 1;
                self.ledger.metrics().policies_expired.inc();
                self.ledger.journal().append(LedgerEvent::PolicyExpired {
                    policy_id: policy.id,
                    passenger,
                    timestamp: now(),
                });
                continue;
            }

            let credited = state
                .credits
                .entry(passenger)
                .or_insert_with(|| CreditAccount::new(passenger))
                .credit(payout);
            if let Err(e) = credited {
                if let CreditError::InvariantViolation { .. } = e {
                    self.ledger
                        .access()
                        .audit()
                        .log_invariant_violation(passenger, &e.to_string());
                }
                error!(policy_id = %policy.id, error = %e, "Policy credit failed");
                summary.failed.push(policy.id);
                continue;
            }

            policy.close(status, payout);
            summary.credited += 1;
            summary.total_payout += payout;
            self.ledger.metrics().policies_credited.inc();
            self.ledger.journal().append(LedgerEvent::PolicyCredited {
                policy_id: policy.id,
                passenger,
                payout: amount(payout),
                timestamp: now(),
            });
            debug!(policy_id = %policy.id, payout = %payout, "Policy credited");
        }

        info!(
            credited = summary.credited,
            expired = summary.expired,
            failed = summary.failed.len(),
            total_payout = %summary.total_payout,
            "Flight settled"
        );
        Ok(summary)
    }

    pub fn credit_of(&self, passenger: &Address) -> Decimal {
        self.ledger.state().credit_of(passenger)
    }

    pub fn policy(&self, passenger: &Address, flight: &FlightKey) -> Option<Policy> {
        self.ledger.state().policy(passenger, flight)
    }

    pub fn policies_for_flight(&self, flight: &FlightKey) -> Vec<Policy> {
        self.ledger.state().policies_for_flight(flight)
    }
}
