//! # FlightSurety Oracle Fleet
//!
//! Simulated oracle operators. The fleet registers a set of oracles, listens
//! for opened status requests, and has every oracle holding the request index
//! submit a status until the request is finalized.

use std::sync::Arc;

use anyhow::{Context, Result};
use flightsurety_common::{
    Address, ErrorKind, FlightStatus, OracleIndex, RequestHandle, INDICES_PER_ORACLE,
};
use flightsurety_ledger::{FlightSurety, ResponseOutcome};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// How simulated oracles pick the status they report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusStrategy {
    /// Uniform over all status codes
    Random,
    /// Every oracle reports the same code
    Fixed(FlightStatus),
}

impl std::str::FromStr for StatusStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("random") {
            return Ok(StatusStrategy::Random);
        }
        let code: u8 = s
            .parse()
            .with_context(|| format!("status strategy must be 'random' or a code, got '{s}'"))?;
        Ok(StatusStrategy::Fixed(FlightStatus::try_from(code)?))
    }
}

/// Fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Oracles to register at startup
    pub oracle_count: usize,
    /// Registration fee paid per oracle
    pub registration_fee: Decimal,
    /// RNG seed for reported statuses
    pub seed: u64,
    pub strategy: StatusStrategy,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            oracle_count: 20,
            registration_fee: Decimal::ONE,
            seed: 7,
            strategy: StatusStrategy::Random,
        }
    }
}

impl FleetConfig {
    /// Load from `FLIGHTSURETY_FLEET_*` environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Ok(val) = std::env::var("FLIGHTSURETY_FLEET_ORACLES") {
            cfg.oracle_count = val.parse().context("FLIGHTSURETY_FLEET_ORACLES")?;
        }
        if let Ok(val) = std::env::var("FLIGHTSURETY_FLEET_FEE") {
            cfg.registration_fee = val.parse().context("FLIGHTSURETY_FLEET_FEE")?;
        }
        if let Ok(val) = std::env::var("FLIGHTSURETY_FLEET_SEED") {
            cfg.seed = val.parse().context("FLIGHTSURETY_FLEET_SEED")?;
        }
        if let Ok(val) = std::env::var("FLIGHTSURETY_FLEET_STATUS") {
            cfg.strategy = val.parse()?;
        }
        Ok(cfg)
    }
}

/// One registered simulated oracle
#[derive(Debug, Clone)]
pub struct SimulatedOracle {
    pub address: Address,
    pub indices: [OracleIndex; INDICES_PER_ORACLE],
}

/// What the fleet did for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetReport {
    pub submitted: usize,
    pub rejected: usize,
    pub finalized: Option<FlightStatus>,
}

/// Simulated oracle operators attached to one service
pub struct OracleFleet {
    service: Arc<FlightSurety>,
    oracles: Vec<SimulatedOracle>,
    strategy: StatusStrategy,
    rng: Mutex<StdRng>,
}

impl OracleFleet {
    /// Register `config.oracle_count` oracles with the service
    pub fn bootstrap(service: Arc<FlightSurety>, config: &FleetConfig) -> Result<Self> {
        let mut oracles = Vec::with_capacity(config.oracle_count);
        for i in 0..config.oracle_count {
            let address = Address::derive(&format!("fleet-oracle-{i}"));
            let indices = service
                .register_oracle(address, config.registration_fee)
                .map_err(|e| anyhow::anyhow!("registering oracle {i}: {}", e.message))?;
            debug!(oracle = %address, indices = ?indices, "Fleet oracle registered");
            oracles.push(SimulatedOracle { address, indices });
        }
        info!(count = oracles.len(), "Oracle fleet registered");

        Ok(Self {
            service,
            oracles,
            strategy: config.strategy,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
        })
    }

    pub fn oracles(&self) -> &[SimulatedOracle] {
        &self.oracles
    }

    fn pick_status(&self) -> FlightStatus {
        match self.strategy {
            StatusStrategy::Fixed(status) => status,
            StatusStrategy::Random => {
                let pick = self.rng.lock().gen_range(0..FlightStatus::ALL.len());
                FlightStatus::ALL[pick]
            }
        }
    }

    /// Have every oracle holding the request index answer it
    pub fn respond(&self, handle: &RequestHandle) -> FleetReport {
        let key = &handle.key;
        let mut report = FleetReport::default();

        for oracle in self.oracles.iter().filter(|o| o.indices.contains(&key.index)) {
            let status = self.pick_status();
            let result = self.service.submit_oracle_response(
                oracle.address,
                key.index,
                key.flight.airline,
                &key.flight.flight,
                key.flight.timestamp,
                status.code(),
            );
            match result {
                Ok(ResponseOutcome::Recorded { .. }) => report.submitted += 1,
                Ok(ResponseOutcome::Finalized { outcome, .. }) => {
                    report.submitted += 1;
                    report.finalized = Some(outcome.status);
                    info!(request = %key, status = %outcome.status, "Fleet finalized request");
                    break;
                }
                Err(err) if err.kind == ErrorKind::RequestClosed => {
                    report.rejected += 1;
                    break;
                }
                Err(err) => {
                    report.rejected += 1;
                    warn!(oracle = %oracle.address, kind = ?err.kind, "Oracle response rejected");
                }
            }
        }
        report
    }

    /// Answer requests until the channel closes
    pub async fn run(&self, mut requests: broadcast::Receiver<RequestHandle>) {
        loop {
            match requests.recv().await {
                Ok(handle) => {
                    let report = self.respond(&handle);
                    debug!(request = %handle.key, ?report, "Request handled");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Oracle fleet lagged behind requests");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Request channel closed, fleet stopping");
                    break;
                }
            }
        }
    }
}
