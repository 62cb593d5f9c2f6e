//! Ledger: state store, access guard, journal, and metrics shared by the
//! governance, insurance, and consensus components.

pub mod events;
pub mod state;

pub use events::{EventJournal, JournalEntry, LedgerEvent};
pub use state::{AirlineRegistry, LedgerState, PolicyKey};

use std::sync::Arc;

use flightsurety_common::{AccessGuard, Address, AuditLogger, FlightSuretyError, Result, Role};
use tracing::info;

use crate::config::LedgerConfig;
use crate::metrics::LedgerMetrics;

/// Shared ledger context
pub struct Ledger {
    config: LedgerConfig,
    state: LedgerState,
    access: AccessGuard,
    journal: EventJournal,
    metrics: LedgerMetrics,
}

impl Ledger {
    /// Create a ledger owned by `owner`, with `first_airline` registered (unfunded)
    pub fn new(
        config: LedgerConfig,
        owner: Address,
        first_airline: Address,
        first_airline_name: &str,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = LedgerMetrics::new()
            .map_err(|e| FlightSuretyError::Internal(format!("metrics: {e}")))?;
        let audit = Arc::new(AuditLogger::new(config.audit_capacity));
        let ledger = Self {
            journal: EventJournal::new(config.event_buffer),
            access: AccessGuard::new(owner, audit),
            state: LedgerState::new(),
            metrics,
            config,
        };

        ledger
            .state
            .airlines
            .write()
            .admit(first_airline, first_airline_name);
        ledger.metrics.airlines_registered.inc();
        ledger.journal.append(LedgerEvent::AirlineRegistered {
            airline: first_airline,
            name: first_airline_name.to_string(),
            by: owner,
            timestamp: events::now(),
        });

        info!(owner = %owner, first_airline = %first_airline, "Ledger created");
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn access(&self) -> &AccessGuard {
        &self.access
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    /// Operational check plus role check against ledger state
    pub fn guard(&self, caller: &Address, role: Role) -> Result<()> {
        self.access.guard(caller, role, &self.state)
    }

    pub fn check_operational(&self) -> Result<()> {
        self.access.check_operational()
    }

    /// Role check alone, for owner operations that must work while paused
    pub fn check_role(&self, caller: &Address, role: Role) -> Result<()> {
        self.access.check_caller_authorized(caller, role, &self.state)
    }

    pub fn is_operational(&self) -> bool {
        self.access.is_operational()
    }

    /// Owner-only; journaled when the flag actually changes
    pub fn set_operating_status(&self, operational: bool, caller: &Address) -> Result<()> {
        let changed = self.access.is_operational() != operational;
        self.access.set_operating_status(operational, caller)?;
        if changed {
            self.journal.append(LedgerEvent::OperatingStatusChanged {
                operational,
                by: *caller,
                timestamp: events::now(),
            });
        }
        Ok(())
    }

    pub fn authorize_caller(&self, contract: Address, caller: &Address) -> Result<()> {
        let known = self.access.is_authorized_caller(&contract);
        self.access.authorize_caller(contract, caller)?;
        if !known {
            self.journal.append(LedgerEvent::CallerAuthorized {
                caller: contract,
                timestamp: events::now(),
            });
        }
        Ok(())
    }

    pub fn deauthorize_caller(&self, contract: &Address, caller: &Address) -> Result<()> {
        let known = self.access.is_authorized_caller(contract);
        self.access.deauthorize_caller(contract, caller)?;
        if known {
            self.journal.append(LedgerEvent::CallerDeauthorized {
                caller: *contract,
                timestamp: events::now(),
            });
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use flightsurety_common::{AirlineStatus, ErrorKind};

    #[test]
    fn test_first_airline_registered_unfunded() {
        let ledger = ledger();
        let airline = ledger.state().airline(&first_airline()).unwrap();
        assert_eq!(airline.status, AirlineStatus::Registered);
        assert_eq!(ledger.state().registered_count(), 1);
        assert_eq!(ledger.journal().height(), 1);
    }

    #[test]
    fn test_operating_status_is_journaled_on_change() {
        let ledger = ledger();
        ledger.set_operating_status(true, &owner()).unwrap();
        assert_eq!(ledger.journal().height(), 1);

        ledger.set_operating_status(false, &owner()).unwrap();
        assert_eq!(ledger.journal().height(), 2);
        assert_eq!(
            ledger.guard(&first_airline(), Role::RegisteredAirline).unwrap_err().kind(),
            ErrorKind::NotOperational
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LedgerConfig {
            direct_registration_limit: 0,
            ..Default::default()
        };
        let result = Ledger::new(config, owner(), first_airline(), "A");
        assert!(matches!(result, Err(FlightSuretyError::Config(_))));
    }
}
