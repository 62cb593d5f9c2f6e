//! # FlightSurety Common
//!
//! Shared types, errors, and the access guard for the FlightSurety
//! flight-delay insurance marketplace.
//!
//! ## Core Types
//!
//! - [`Address`]: 20-byte account identity
//! - [`Airline`]: registry entry with admission votes and funding
//! - [`FlightKey`]/[`FlightStatus`]: flight identity and oracle status codes
//! - [`Policy`]: passenger insurance on one flight
//! - [`CreditAccount`]: payout credit owed to a passenger
//! - [`Oracle`]/[`OracleRequestKey`]: oracle identity and status-request keys
//!
//! ## Security
//!
//! - [`security::guard`]: operational flag and caller-role checks
//! - [`security::audit`]: audit logging

pub mod error;
pub mod security;
pub mod types;

use rust_decimal::Decimal;

// Re-export commonly used types at crate root
pub use error::{
    AccessError, ErrorKind, ErrorReport, FlightSuretyError, GovernanceError, InsuranceError,
    OracleError, Result,
};
pub use security::{AccessGuard, AuditLogger, Role, RoleResolver};
pub use types::{
    address::{Address, AddressError},
    airline::{admission_threshold, Airline, AirlineStatus},
    credit::{CreditAccount, CreditError},
    flight::{Flight, FlightKey, FlightStatus},
    oracle::{
        ConsensusOutcome, Oracle, OracleIndex, OracleRequestKey, RequestHandle, RequestState,
        INDICES_PER_ORACLE,
    },
    policy::{Policy, PolicyReceipt, PolicyStatus},
};

/// FlightSurety version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Funding an airline must provide before it may participate (10 units)
pub const AIRLINE_FUNDING_MINIMUM: Decimal = Decimal::TEN;

/// Maximum insured amount per policy (1 unit)
pub const MAX_INSURED_AMOUNT: Decimal = Decimal::ONE;

/// Payout multiplier on airline-caused delay (1.5x)
pub const PAYOUT_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

/// Oracle registration fee (1 unit)
pub const ORACLE_REGISTRATION_FEE: Decimal = Decimal::ONE;

/// Matching oracle responses needed to accept a status
pub const MIN_ORACLE_RESPONSES: usize = 3;

/// Airlines admitted without a vote
pub const DIRECT_REGISTRATION_LIMIT: usize = 4;

/// Oracle indices are drawn from `0..ORACLE_INDEX_RANGE`
pub const ORACLE_INDEX_RANGE: u8 = 10;
