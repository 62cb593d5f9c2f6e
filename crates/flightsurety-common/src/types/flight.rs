//! Flights and flight status codes

use crate::error::OracleError;
use crate::types::address::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one scheduled departure: (airline, flight designator, timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: Address,
    pub flight: String,
    /// Scheduled departure (Unix seconds)
    pub timestamp: u64,
}

impl FlightKey {
    pub fn new(airline: Address, flight: impl Into<String>, timestamp: u64) -> Self {
        Self {
            airline,
            flight: flight.into(),
            timestamp,
        }
    }

    /// Stable digest of the key
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.airline.as_bytes());
        hasher.update(self.flight.as_bytes());
        hasher.update(&self.timestamp.to_be_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.flight, self.timestamp, self.airline)
    }
}

/// Flight status as reported by oracles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlightStatus {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl FlightStatus {
    /// All reportable codes
    pub const ALL: [FlightStatus; 6] = [
        FlightStatus::Unknown,
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
    ];

    /// Wire code
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Only airline-caused delays pay out
    #[inline]
    pub fn is_airline_fault(self) -> bool {
        self == FlightStatus::LateAirline
    }
}

impl TryFrom<u8> for FlightStatus {
    type Error = OracleError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FlightStatus::Unknown),
            10 => Ok(FlightStatus::OnTime),
            20 => Ok(FlightStatus::LateAirline),
            30 => Ok(FlightStatus::LateWeather),
            40 => Ok(FlightStatus::LateTechnical),
            50 => Ok(FlightStatus::LateOther),
            other => Err(OracleError::InvalidStatusCode(other)),
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// A flight registered by a funded airline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    /// Final status once oracle consensus is reached, `Unknown` before
    pub status: FlightStatus,
    /// Registration time (Unix milliseconds)
    pub registered_at: i64,
    /// Time the status was finalized (Unix milliseconds)
    pub resolved_at: Option<i64>,
}

impl Flight {
    pub fn new(key: FlightKey) -> Self {
        Self {
            key,
            status: FlightStatus::Unknown,
            registered_at: chrono::Utc::now().timestamp_millis(),
            resolved_at: None,
        }
    }

    /// Whether oracle consensus has already fixed the status
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Record the consensus outcome
    pub fn resolve(&mut self, status: FlightStatus) {
        self.status = status;
        self.resolved_at = Some(chrono::Utc::now().timestamp_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for status in FlightStatus::ALL {
            assert_eq!(FlightStatus::try_from(status.code()).unwrap(), status);
        }
        assert_eq!(
            FlightStatus::try_from(15),
            Err(OracleError::InvalidStatusCode(15))
        );
    }

    #[test]
    fn test_only_airline_delay_is_fault() {
        let faults: Vec<_> = FlightStatus::ALL
            .iter()
            .filter(|s| s.is_airline_fault())
            .collect();
        assert_eq!(faults, vec![&FlightStatus::LateAirline]);
    }

    #[test]
    fn test_key_digest_distinguishes_fields() {
        let airline = Address::derive("airline");
        let a = FlightKey::new(airline, "ND1309", 1_700_000_000);
        let b = FlightKey::new(airline, "ND1309", 1_700_000_001);
        assert_eq!(a.digest(), a.clone().digest());
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_flight_resolution() {
        let mut flight = Flight::new(FlightKey::new(Address::derive("a"), "AB12", 1));
        assert!(!flight.is_resolved());
        flight.resolve(FlightStatus::OnTime);
        assert!(flight.is_resolved());
        assert_eq!(flight.status, FlightStatus::OnTime);
    }
}
