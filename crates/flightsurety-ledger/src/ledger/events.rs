//! Append-only event journal
//!
//! Every accepted state transition is appended here with a sequence number.
//! The journal length doubles as the ledger height used when deriving
//! oracle indices. Subscribers receive entries through a broadcast channel.

use flightsurety_common::{Address, FlightKey, FlightStatus, OracleIndex, OracleRequestKey};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Event types recorded by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LedgerEvent {
    OperatingStatusChanged {
        operational: bool,
        by: Address,
        timestamp: i64,
    },
    CallerAuthorized {
        caller: Address,
        timestamp: i64,
    },
    CallerDeauthorized {
        caller: Address,
        timestamp: i64,
    },
    AirlineRegistered {
        airline: Address,
        name: String,
        by: Address,
        timestamp: i64,
    },
    AirlineVoted {
        candidate: Address,
        voter: Address,
        votes: usize,
        required: usize,
        timestamp: i64,
    },
    AirlineFunded {
        airline: Address,
        amount: String,
        total: String,
        timestamp: i64,
    },
    FlightRegistered {
        flight: FlightKey,
        timestamp: i64,
    },
    PolicyPurchased {
        policy_id: Uuid,
        passenger: Address,
        flight: FlightKey,
        amount: String,
        timestamp: i64,
    },
    PolicyCredited {
        policy_id: Uuid,
        passenger: Address,
        payout: String,
        timestamp: i64,
    },
    PolicyExpired {
        policy_id: Uuid,
        passenger: Address,
        timestamp: i64,
    },
    FlightStatusFinalized {
        flight: FlightKey,
        status: FlightStatus,
        timestamp: i64,
    },
    CreditWithdrawn {
        passenger: Address,
        amount: String,
        timestamp: i64,
    },
    OracleRegistered {
        oracle: Address,
        indices: Vec<OracleIndex>,
        timestamp: i64,
    },
    OracleRequested {
        request: OracleRequestKey,
        requester: Address,
        timestamp: i64,
    },
    OracleReportReceived {
        request: OracleRequestKey,
        oracle: Address,
        status: FlightStatus,
        timestamp: i64,
    },
    ConsensusReached {
        request: OracleRequestKey,
        status: FlightStatus,
        agreeing: Vec<Address>,
        timestamp: i64,
    },
    RequestAbandoned {
        request: OracleRequestKey,
        timestamp: i64,
    },
}

impl LedgerEvent {
    /// Stable name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::OperatingStatusChanged { .. } => "OperatingStatusChanged",
            LedgerEvent::CallerAuthorized { .. } => "CallerAuthorized",
            LedgerEvent::CallerDeauthorized { .. } => "CallerDeauthorized",
            LedgerEvent::AirlineRegistered { .. } => "AirlineRegistered",
            LedgerEvent::AirlineVoted { .. } => "AirlineVoted",
            LedgerEvent::AirlineFunded { .. } => "AirlineFunded",
            LedgerEvent::FlightRegistered { .. } => "FlightRegistered",
            LedgerEvent::PolicyPurchased { .. } => "PolicyPurchased",
            LedgerEvent::PolicyCredited { .. } => "PolicyCredited",
            LedgerEvent::PolicyExpired { .. } => "PolicyExpired",
            LedgerEvent::FlightStatusFinalized { .. } => "FlightStatusFinalized",
            LedgerEvent::CreditWithdrawn { .. } => "CreditWithdrawn",
            LedgerEvent::OracleRegistered { .. } => "OracleRegistered",
            LedgerEvent::OracleRequested { .. } => "OracleRequested",
            LedgerEvent::OracleReportReceived { .. } => "OracleReportReceived",
            LedgerEvent::ConsensusReached { .. } => "ConsensusReached",
            LedgerEvent::RequestAbandoned { .. } => "RequestAbandoned",
        }
    }
}

/// Amounts are journaled as strings so the JSON form keeps full precision
pub(crate) fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub event: LedgerEvent,
}

/// In-memory append-only journal
///
/// Entries are the audit history and are never pruned; memory grows with
/// the number of events.
pub struct EventJournal {
    entries: RwLock<Vec<JournalEntry>>,
    tx: broadcast::Sender<JournalEntry>,
}

impl EventJournal {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            entries: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Append an event and return its sequence number
    pub fn append(&self, event: LedgerEvent) -> u64 {
        let entry = {
            let mut entries = self.entries.write();
            let entry = JournalEntry {
                sequence: entries.len() as u64,
                event,
            };
            entries.push(entry.clone());
            entry
        };

        trace!(sequence = entry.sequence, event = entry.event.name(), "journal append");
        // No subscribers is fine
        let _ = self.tx.send(entry.clone());
        entry.sequence
    }

    /// Number of events appended so far
    pub fn height(&self) -> u64 {
        self.entries.read().len() as u64
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().clone()
    }

    /// Entries from `sequence` onwards
    pub fn since(&self, sequence: u64) -> Vec<JournalEntry> {
        let entries = self.entries.read();
        let start = (sequence as usize).min(entries.len());
        entries[start..].to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JournalEntry> {
        self.tx.subscribe()
    }

    /// Serialize the whole journal as JSON lines
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let entries = self.entries.read();
        let mut out = String::new();
        for entry in entries.iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(name: &str) -> LedgerEvent {
        LedgerEvent::AirlineRegistered {
            airline: Address::derive(name),
            name: name.to_string(),
            by: Address::derive("owner"),
            timestamp: 0,
        }
    }

    #[test]
    fn test_sequence_and_height() {
        let journal = EventJournal::new(16);
        assert_eq!(journal.append(registered("a")), 0);
        assert_eq!(journal.append(registered("b")), 1);
        assert_eq!(journal.height(), 2);
        assert_eq!(journal.since(1).len(), 1);
        assert!(journal.since(10).is_empty());
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_string(&registered("a")).unwrap();
        assert!(json.contains("\"type\":\"AirlineRegistered\""));
        assert!(json.contains("\"data\""));

        let journal = EventJournal::new(4);
        journal.append(registered("a"));
        assert_eq!(journal.to_json_lines().unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_entries() {
        let journal = EventJournal::new(4);
        let mut rx = journal.subscribe();
        journal.append(registered("a"));

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.sequence, 0);
        assert_eq!(entry.event.name(), "AirlineRegistered");
    }
}
