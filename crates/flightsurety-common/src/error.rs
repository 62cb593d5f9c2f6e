//! Error types for the FlightSurety marketplace
//!
//! Every rejection is local and recoverable. Domain errors fold into
//! [`FlightSuretyError`], and the boundary flattens them into an
//! [`ErrorReport`] of `(kind, message)`.

use crate::security::guard::Role;
use crate::types::address::Address;
use crate::types::credit::CreditError;
use crate::types::flight::{FlightKey, FlightStatus};
use crate::types::oracle::{OracleIndex, OracleRequestKey, RequestState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using FlightSuretyError
pub type Result<T> = std::result::Result<T, FlightSuretyError>;

/// Unified error type for FlightSurety operations
#[derive(Debug, Error)]
pub enum FlightSuretyError {
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Governance error: {0}")]
    Governance(#[from] GovernanceError),

    #[error("Insurance error: {0}")]
    Insurance(#[from] InsuranceError),

    #[error("Credit error: {0}")]
    Credit(#[from] CreditError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Guard rejections
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccessError {
    #[error("Contract is currently not operational")]
    NotOperational,

    #[error("Caller {caller} lacks role {role}")]
    Unauthorized { caller: Address, role: Role },
}

/// Airline admission, funding, and flight registration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Airline {airline} has not provided the required funding")]
    NotFunded { airline: Address },

    #[error("Insufficient funding: {offered} offered, {required} required")]
    InsufficientFunds { required: Decimal, offered: Decimal },

    #[error("Voter {voter} already voted for candidate {candidate}")]
    DuplicateVote { voter: Address, candidate: Address },

    #[error("Airline {airline} is already registered")]
    AlreadyRegistered { airline: Address },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Flight {key} is already registered")]
    FlightAlreadyRegistered { key: FlightKey },
}

/// Policy purchase, settlement, and payout errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InsuranceError {
    #[error("Insured amount {amount} exceeds cap {cap}")]
    AmountExceedsCap { amount: Decimal, cap: Decimal },

    #[error("No scheduled flight matches {key}")]
    UnknownFlight { key: FlightKey },

    #[error("Passenger {passenger} already holds an active policy for {key}")]
    DuplicatePolicy { passenger: Address, key: FlightKey },

    #[error("Flight {key} already resolved with status {status}")]
    FlightAlreadyResolved { key: FlightKey, status: FlightStatus },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Treasury cannot cover {required}: {available} available")]
    TreasuryShortfall { required: Decimal, available: Decimal },

    #[error("Transfer of {amount} to {passenger} failed: {reason}")]
    TransferFailed {
        passenger: Address,
        amount: Decimal,
        reason: String,
    },
}

/// Oracle registration and response errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("Registration fee {fee} below required {required}")]
    InsufficientFee { fee: Decimal, required: Decimal },

    #[error("Oracle {oracle} is already registered")]
    AlreadyRegistered { oracle: Address },

    #[error("Index {index} is not assigned to oracle {oracle}")]
    IndexMismatch { oracle: Address, index: OracleIndex },

    #[error("No open request for {key}")]
    UnknownRequest { key: OracleRequestKey },

    #[error("Oracle {oracle} already responded to {key}")]
    DuplicateResponse { oracle: Address, key: OracleRequestKey },

    #[error("Request {key} is {state:?} and accepts no responses")]
    RequestClosed {
        key: OracleRequestKey,
        state: RequestState,
    },

    #[error("Unrecognised flight status code {0}")]
    InvalidStatusCode(u8),
}

/// Flat classification of every error, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotOperational,
    Unauthorized,
    NotFunded,
    InsufficientFunds,
    DuplicateVote,
    AlreadyRegistered,
    InvalidAmount,
    FlightAlreadyRegistered,
    AmountExceedsCap,
    UnknownFlight,
    DuplicatePolicy,
    FlightAlreadyResolved,
    NoCredit,
    TransferFailed,
    InvariantViolation,
    AccountFrozen,
    InsufficientFee,
    OracleAlreadyRegistered,
    IndexMismatch,
    UnknownRequest,
    DuplicateResponse,
    RequestClosed,
    InvalidStatusCode,
    Config,
    Channel,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FlightSuretyError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlightSuretyError::Access(e) => match e {
                AccessError::NotOperational => ErrorKind::NotOperational,
                AccessError::Unauthorized { .. } => ErrorKind::Unauthorized,
            },
            FlightSuretyError::Governance(e) => match e {
                GovernanceError::NotFunded { .. } => ErrorKind::NotFunded,
                GovernanceError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
                GovernanceError::DuplicateVote { .. } => ErrorKind::DuplicateVote,
                GovernanceError::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
                GovernanceError::InvalidAmount => ErrorKind::InvalidAmount,
                GovernanceError::FlightAlreadyRegistered { .. } => {
                    ErrorKind::FlightAlreadyRegistered
                }
            },
            FlightSuretyError::Insurance(e) => match e {
                InsuranceError::AmountExceedsCap { .. } => ErrorKind::AmountExceedsCap,
                InsuranceError::UnknownFlight { .. } => ErrorKind::UnknownFlight,
                InsuranceError::DuplicatePolicy { .. } => ErrorKind::DuplicatePolicy,
                InsuranceError::FlightAlreadyResolved { .. } => ErrorKind::FlightAlreadyResolved,
                InsuranceError::InvalidAmount => ErrorKind::InvalidAmount,
                InsuranceError::TreasuryShortfall { .. } => ErrorKind::InsufficientFunds,
                InsuranceError::TransferFailed { .. } => ErrorKind::TransferFailed,
            },
            FlightSuretyError::Credit(e) => match e {
                CreditError::NoCredit { .. } => ErrorKind::NoCredit,
                CreditError::InvalidAmount => ErrorKind::InvalidAmount,
                CreditError::InvariantViolation { .. } | CreditError::Overflow => {
                    ErrorKind::InvariantViolation
                }
                CreditError::AccountFrozen { .. } => ErrorKind::AccountFrozen,
            },
            FlightSuretyError::Oracle(e) => match e {
                OracleError::InsufficientFee { .. } => ErrorKind::InsufficientFee,
                OracleError::AlreadyRegistered { .. } => ErrorKind::OracleAlreadyRegistered,
                OracleError::IndexMismatch { .. } => ErrorKind::IndexMismatch,
                OracleError::UnknownRequest { .. } => ErrorKind::UnknownRequest,
                OracleError::DuplicateResponse { .. } => ErrorKind::DuplicateResponse,
                OracleError::RequestClosed { .. } => ErrorKind::RequestClosed,
                OracleError::InvalidStatusCode(_) => ErrorKind::InvalidStatusCode,
            },
            FlightSuretyError::Config(_) => ErrorKind::Config,
            FlightSuretyError::Channel(_) => ErrorKind::Channel,
            FlightSuretyError::Serialization(_) | FlightSuretyError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Structured `(kind, message)` error handed to the client layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorReport {}

impl From<&FlightSuretyError> for ErrorReport {
    fn from(err: &FlightSuretyError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<FlightSuretyError> for ErrorReport {
    fn from(err: FlightSuretyError) -> Self {
        Self::from(&err)
    }
}

impl From<serde_json::Error> for FlightSuretyError {
    fn from(err: serde_json::Error) -> Self {
        FlightSuretyError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FlightSuretyError {
    fn from(err: anyhow::Error) -> Self {
        FlightSuretyError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let airline = Address::derive("airline");
        let err = FlightSuretyError::Governance(GovernanceError::NotFunded { airline });
        assert!(err.to_string().contains(&airline.to_string()));
        assert_eq!(err.kind(), ErrorKind::NotFunded);
    }

    #[test]
    fn test_treasury_shortfall_reports_insufficient_funds() {
        let err = FlightSuretyError::from(InsuranceError::TreasuryShortfall {
            required: Decimal::TEN,
            available: Decimal::ONE,
        });
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn test_report_carries_kind_and_message() {
        let err = FlightSuretyError::from(OracleError::InvalidStatusCode(7));
        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, ErrorKind::InvalidStatusCode);
        assert!(report.message.contains('7'));
        assert!(report.to_json().contains("InvalidStatusCode"));
    }
}
