//! Oracle identities and status-request keys

use crate::types::address::Address;
use crate::types::flight::{FlightKey, FlightStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query index an oracle listens on
pub type OracleIndex = u8;

/// Indices assigned to every oracle at registration
pub const INDICES_PER_ORACLE: usize = 3;

/// A registered oracle operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Oracle {
    pub address: Address,
    /// Distinct indices, immutable after registration
    pub indices: [OracleIndex; INDICES_PER_ORACLE],
    pub fee_paid: Decimal,
    /// Registration time (Unix milliseconds)
    pub registered_at: i64,
}

impl Oracle {
    pub fn new(address: Address, indices: [OracleIndex; INDICES_PER_ORACLE], fee_paid: Decimal) -> Self {
        Self {
            address,
            indices,
            fee_paid,
            registered_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn has_index(&self, index: OracleIndex) -> bool {
        self.indices.contains(&index)
    }
}

/// Uniquely identifies one in-flight status query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OracleRequestKey {
    pub index: OracleIndex,
    pub flight: FlightKey,
}

impl OracleRequestKey {
    pub fn new(index: OracleIndex, flight: FlightKey) -> Self {
        Self { index, flight }
    }

    /// Stable digest used as the request id
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.index]);
        hasher.update(&self.flight.digest());
        *hasher.finalize().as_bytes()
    }

    /// Hex request id
    pub fn id(&self) -> String {
        hex::encode(self.digest())
    }
}

impl fmt::Display for OracleRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.flight)
    }
}

/// Request lifecycle: `Open → ConsensusReached → Closed`, or `Open → Abandoned`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Open,
    ConsensusReached,
    Closed,
    Abandoned,
}

impl RequestState {
    pub fn accepts_responses(self) -> bool {
        self == RequestState::Open
    }
}

/// Handle returned when a status check is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHandle {
    pub id: String,
    pub key: OracleRequestKey,
    pub requester: Address,
    pub opened_at: i64,
}

/// Final result of a closed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub status: FlightStatus,
    /// Oracles that agreed, in arrival order
    pub agreeing: Vec<Address>,
    pub finalized_at: i64,
}
