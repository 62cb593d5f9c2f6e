//! Flight-delay insurance policies

use crate::types::address::Address;
use crate::types::flight::{FlightKey, FlightStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Policy lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    /// Purchased, flight not yet resolved
    Active,
    /// Resolved as an airline-caused delay and credited
    Settled,
    /// Resolved with any other status, nothing owed
    Expired,
}

/// Insurance held by one passenger on one flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: Uuid,
    pub passenger: Address,
    pub flight: FlightKey,
    /// Fixed at purchase
    pub insured_amount: Decimal,
    pub status: PolicyStatus,
    /// Credit granted on settlement
    pub payout: Decimal,
    /// Outcome the policy was closed against
    pub outcome: Option<FlightStatus>,
    /// Purchase time (Unix milliseconds)
    pub purchased_at: i64,
    /// Settlement time (Unix milliseconds)
    pub closed_at: Option<i64>,
}

impl Policy {
    pub fn new(passenger: Address, flight: FlightKey, insured_amount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            passenger,
            flight,
            insured_amount,
            status: PolicyStatus::Active,
            payout: Decimal::ZERO,
            outcome: None,
            purchased_at: chrono::Utc::now().timestamp_millis(),
            closed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }

    /// Payout owed for an outcome: `multiplier × insured` on airline fault, else zero
    pub fn payout_for(&self, outcome: FlightStatus, multiplier: Decimal) -> Decimal {
        if outcome.is_airline_fault() {
            self.insured_amount * multiplier
        } else {
            Decimal::ZERO
        }
    }

    /// Close the policy against a final outcome
    pub fn close(&mut self, outcome: FlightStatus, payout: Decimal) {
        self.status = if outcome.is_airline_fault() {
            PolicyStatus::Settled
        } else {
            PolicyStatus::Expired
        };
        self.payout = payout;
        self.outcome = Some(outcome);
        self.closed_at = Some(chrono::Utc::now().timestamp_millis());
    }

    pub fn receipt(&self) -> PolicyReceipt {
        PolicyReceipt {
            policy_id: self.id,
            passenger: self.passenger,
            flight: self.flight.clone(),
            insured_amount: self.insured_amount,
            purchased_at: self.purchased_at,
        }
    }
}

/// Proof of purchase returned to the passenger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyReceipt {
    pub policy_id: Uuid,
    pub passenger: Address,
    pub flight: FlightKey,
    pub insured_amount: Decimal,
    pub purchased_at: i64,
}
