//! Ledger configuration
//!
//! Economic constants and consensus thresholds. Values come from, in order
//! of precedence: `FLIGHTSURETY__*` environment variables (after `.env`),
//! an optional config file, then the built-in defaults.

use flightsurety_common::{
    FlightSuretyError, Result, AIRLINE_FUNDING_MINIMUM, DIRECT_REGISTRATION_LIMIT,
    MAX_INSURED_AMOUNT, MIN_ORACLE_RESPONSES, ORACLE_REGISTRATION_FEE, PAYOUT_MULTIPLIER,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted request timeout (30 days)
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Funding an airline must reach before it may participate
    pub airline_funding_minimum: Decimal,
    /// Cap on the insured amount of one policy
    pub max_insured_amount: Decimal,
    /// Multiplier applied to the insured amount on airline-caused delay
    pub payout_multiplier: Decimal,
    /// Fee an oracle pays to register
    pub oracle_registration_fee: Decimal,
    /// Matching responses needed to accept a flight status
    pub min_oracle_responses: usize,
    /// Airlines admitted without a vote
    pub direct_registration_limit: usize,
    /// Open requests older than this are abandoned by the sweep
    pub request_timeout_secs: u64,
    /// Capacity of the journal broadcast channel
    pub event_buffer: usize,
    /// Audit events kept in memory
    pub audit_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            airline_funding_minimum: AIRLINE_FUNDING_MINIMUM,
            max_insured_amount: MAX_INSURED_AMOUNT,
            payout_multiplier: PAYOUT_MULTIPLIER,
            oracle_registration_fee: ORACLE_REGISTRATION_FEE,
            min_oracle_responses: MIN_ORACLE_RESPONSES,
            direct_registration_limit: DIRECT_REGISTRATION_LIMIT,
            request_timeout_secs: 300,
            event_buffer: 1024,
            audit_capacity: 1024,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&LedgerConfig::default()).map_err(config_error)?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FLIGHTSURETY")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: LedgerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the ledger cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.airline_funding_minimum <= Decimal::ZERO {
            return Err(invalid("airline_funding_minimum must be positive"));
        }
        if self.max_insured_amount <= Decimal::ZERO {
            return Err(invalid("max_insured_amount must be positive"));
        }
        if self.payout_multiplier < Decimal::ONE {
            return Err(invalid("payout_multiplier must be at least 1"));
        }
        if self.oracle_registration_fee < Decimal::ZERO {
            return Err(invalid("oracle_registration_fee must not be negative"));
        }
        if self.min_oracle_responses == 0 {
            return Err(invalid("min_oracle_responses must be at least 1"));
        }
        if self.direct_registration_limit == 0 {
            return Err(invalid("direct_registration_limit must be at least 1"));
        }
        if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(invalid("request_timeout_secs must be at most 30 days"));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer must be at least 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn config_error(err: config::ConfigError) -> FlightSuretyError {
    FlightSuretyError::Config(err.to_string())
}

fn invalid(reason: &str) -> FlightSuretyError {
    FlightSuretyError::Config(reason.to_string())
}
