//! Ledger state store
//!
//! Arena-style registries keyed by stable identifiers. Lock order, where
//! more than one is held: airline registry, then flights, then policies,
//! then insurees, then credits, then the treasury.

use std::collections::HashMap;

use dashmap::DashMap;
use flightsurety_common::{
    Address, Airline, AirlineStatus, CreditAccount, Flight, FlightKey, InsuranceError, Oracle,
    Policy, RoleResolver,
};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;

/// Policy slot: one per passenger per flight
pub type PolicyKey = (Address, FlightKey);

/// Airlines and candidates, with the admitted count kept alongside
///
/// Admission depends on the registry-wide count, so the whole registry
/// sits behind one lock.
#[derive(Debug, Default)]
pub struct AirlineRegistry {
    airlines: HashMap<Address, Airline>,
    registered: usize,
}

impl AirlineRegistry {
    pub fn get(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Airline> {
        self.airlines.get_mut(address)
    }

    pub fn status(&self, address: &Address) -> AirlineStatus {
        self.airlines
            .get(address)
            .map(|a| a.status)
            .unwrap_or(AirlineStatus::Unregistered)
    }

    /// Admitted airlines, funded or not
    pub fn registered_count(&self) -> usize {
        self.registered
    }

    /// Existing entry, or a fresh candidate
    pub fn candidate(&mut self, address: Address, name: &str) -> &mut Airline {
        self.airlines
            .entry(address)
            .or_insert_with(|| Airline::candidate(address, name))
    }

    /// Admit `address`; returns false if it was already admitted
    pub fn admit(&mut self, address: Address, name: &str) -> bool {
        let airline = self.candidate(address, name);
        if airline.is_registered() {
            return false;
        }
        airline.admit();
        self.registered += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.airlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airlines.is_empty()
    }
}

/// All mutable ledger data
pub struct LedgerState {
    pub(crate) airlines: RwLock<AirlineRegistry>,
    pub(crate) flights: DashMap<FlightKey, Flight>,
    pub(crate) policies: DashMap<PolicyKey, Policy>,
    /// Passengers holding a policy per flight, in purchase order
    pub(crate) insurees: DashMap<FlightKey, Vec<Address>>,
    pub(crate) credits: DashMap<Address, CreditAccount>,
    pub(crate) oracles: DashMap<Address, Oracle>,
    treasury: Mutex<Decimal>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self {
            airlines: RwLock::new(AirlineRegistry::default()),
            flights: DashMap::new(),
            policies: DashMap::new(),
            insurees: DashMap::new(),
            credits: DashMap::new(),
            oracles: DashMap::new(),
            treasury: Mutex::new(Decimal::ZERO),
        }
    }

    pub fn treasury(&self) -> Decimal {
        *self.treasury.lock()
    }

    pub fn deposit(&self, amount: Decimal) {
        *self.treasury.lock() += amount;
    }

    /// Take `amount` out of the treasury, all or nothing
    pub fn disburse(&self, amount: Decimal) -> Result<(), InsuranceError> {
        let mut treasury = self.treasury.lock();
        if *treasury < amount {
            return Err(InsuranceError::TreasuryShortfall {
                required: amount,
                available: *treasury,
            });
        }
        *treasury -= amount;
        Ok(())
    }

    pub fn airline(&self, address: &Address) -> Option<Airline> {
        self.airlines.read().get(address).cloned()
    }

    pub fn registered_count(&self) -> usize {
        self.airlines.read().registered_count()
    }

    pub fn flight(&self, key: &FlightKey) -> Option<Flight> {
        self.flights.get(key).map(|f| f.clone())
    }

    pub fn policy(&self, passenger: &Address, flight: &FlightKey) -> Option<Policy> {
        self.policies
            .get(&(*passenger, flight.clone()))
            .map(|p| p.clone())
    }

    pub fn policies_for_flight(&self, flight: &FlightKey) -> Vec<Policy> {
        let passengers = self
            .insurees
            .get(flight)
            .map(|p| p.clone())
            .unwrap_or_default();
        passengers
            .iter()
            .filter_map(|passenger| self.policy(passenger, flight))
            .collect()
    }

    pub fn credit_of(&self, passenger: &Address) -> Decimal {
        self.credits
            .get(passenger)
            .map(|c| c.balance)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn credit_account(&self, passenger: &Address) -> Option<CreditAccount> {
        self.credits.get(passenger).map(|c| c.clone())
    }

    pub fn oracle(&self, address: &Address) -> Option<Oracle> {
        self.oracles.get(address).map(|o| o.clone())
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleResolver for LedgerState {
    fn airline_status(&self, address: &Address) -> AirlineStatus {
        self.airlines.read().status(address)
    }

    fn is_oracle(&self, address: &Address) -> bool {
        self.oracles.contains_key(address)
    }
}
