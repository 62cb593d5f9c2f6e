//! Client-facing boundary
//!
//! Every operation returns an [`ErrorReport`] on rejection and counts the
//! rejection by kind.

use std::sync::Arc;

use flightsurety_common::{
    Address, ErrorReport, FlightKey, FlightSuretyError, OracleIndex, OracleRequestKey, PolicyReceipt,
    RequestHandle, Result, Role, INDICES_PER_ORACLE,
};
use prometheus::Registry;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::consensus::{InMemoryOracleChannel, OracleChannel, OracleConsensusEngine, ResponseOutcome};
use crate::governance::AirlineGovernance;
use crate::insurance::{InMemoryPayoutGateway, PayoutGateway, PolicyManager};
use crate::ledger::{JournalEntry, Ledger};

/// Boundary result
pub type Reply<T> = std::result::Result<T, ErrorReport>;

/// FlightSurety application service
pub struct FlightSurety {
    ledger: Arc<Ledger>,
    governance: AirlineGovernance,
    policies: Arc<PolicyManager>,
    consensus: OracleConsensusEngine,
}

impl FlightSurety {
    /// Build the service and authorize its own settlement identity
    pub fn new(
        config: LedgerConfig,
        owner: Address,
        first_airline: Address,
        first_airline_name: &str,
        channel: Arc<dyn OracleChannel>,
        gateway: Arc<dyn PayoutGateway>,
    ) -> Result<Self> {
        let ledger = Arc::new(Ledger::new(config, owner, first_airline, first_airline_name)?);

        // Per-instance settlement identity, never derivable from public inputs
        let identity = Address::derive(&format!("flightsurety-app:{}", Uuid::now_v7()));
        ledger.authorize_caller(identity, &owner)?;

        let policies = Arc::new(PolicyManager::new(ledger.clone(), gateway));
        let consensus =
            OracleConsensusEngine::new(ledger.clone(), policies.clone(), channel, identity);

        info!(owner = %owner, app = %identity, "FlightSurety service ready");
        Ok(Self {
            governance: AirlineGovernance::new(ledger.clone()),
            ledger,
            policies,
            consensus,
        })
    }

    /// Default configuration with in-memory oracle channel and payout gateway
    pub fn standalone(owner: Address, first_airline: Address) -> Result<Self> {
        Self::new(
            LedgerConfig::default(),
            owner,
            first_airline,
            "Founding Airline",
            Arc::new(InMemoryOracleChannel::default()),
            Arc::new(InMemoryPayoutGateway::new()),
        )
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn governance(&self) -> &AirlineGovernance {
        &self.governance
    }

    pub fn policies(&self) -> &PolicyManager {
        &self.policies
    }

    pub fn consensus(&self) -> &OracleConsensusEngine {
        &self.consensus
    }

    /// Settlement identity this service presents to the policy manager
    pub(crate) fn identity(&self) -> Address {
        self.consensus.identity()
    }

    pub fn register_metrics(&self, registry: &Registry) -> prometheus::Result<()> {
        self.ledger.metrics().register(registry)
    }

    fn reply<T>(&self, operation: &'static str, result: Result<T>) -> Reply<T> {
        result.map_err(|err| {
            let report = ErrorReport::from(&err);
            self.ledger.metrics().record_rejection(report.kind);
            debug!(operation, kind = ?report.kind, reason = %report.message, "Rejected");
            report
        })
    }

    pub fn is_operational(&self) -> bool {
        self.ledger.is_operational()
    }

    #[instrument(skip_all, fields(caller = %caller, operational = operational))]
    pub fn set_operating_status(&self, operational: bool, caller: Address) -> Reply<()> {
        self.reply(
            "set_operating_status",
            self.ledger.set_operating_status(operational, &caller),
        )
    }

    pub fn authorize_caller(&self, contract: Address, caller: Address) -> Reply<()> {
        self.reply(
            "authorize_caller",
            self.ledger.authorize_caller(contract, &caller),
        )
    }

    pub fn deauthorize_caller(&self, contract: Address, caller: Address) -> Reply<()> {
        self.reply(
            "deauthorize_caller",
            self.ledger.deauthorize_caller(&contract, &caller),
        )
    }

    /// Register or vote for `airline`; `true` once it is admitted
    #[instrument(skip_all, fields(proposer = %proposer, airline = %airline))]
    pub fn register_airline(&self, proposer: Address, name: &str, airline: Address) -> Reply<bool> {
        self.reply(
            "register_airline",
            self.governance
                .register_airline(name, airline, proposer)
                .map(|admission| admission.is_admitted()),
        )
    }

    /// Contribute to an airline's funding; returns its cumulative total
    pub fn fund_airline(&self, airline: Address, amount: Decimal) -> Reply<Decimal> {
        self.reply("fund_airline", self.governance.fund_airline(airline, amount))
    }

    pub fn register_flight(&self, airline: Address, flight: &str, timestamp: u64) -> Reply<FlightKey> {
        self.reply(
            "register_flight",
            self.governance.register_flight(airline, flight, timestamp),
        )
    }

    #[instrument(skip_all, fields(passenger = %passenger, flight = %flight, timestamp = timestamp))]
    pub fn buy(
        &self,
        passenger: Address,
        flight: &str,
        timestamp: u64,
        airline: Address,
        amount: Decimal,
    ) -> Reply<PolicyReceipt> {
        let key = FlightKey::new(airline, flight, timestamp);
        self.reply("buy", self.policies.buy_policy(passenger, key, amount))
    }

    pub fn get_passenger_credit(&self, passenger: Address) -> Decimal {
        self.policies.credit_of(&passenger)
    }

    pub async fn withdraw_credits(&self, passenger: Address) -> Reply<Decimal> {
        let result = self.policies.withdraw_credit(passenger).await;
        self.reply("withdraw_credits", result)
    }

    /// Ask the oracle pool for the status of a flight
    pub async fn fetch_flight_status(
        &self,
        requester: Address,
        flight: &str,
        airline: Address,
        timestamp: u64,
    ) -> Reply<RequestHandle> {
        let key = FlightKey::new(airline, flight, timestamp);
        let result = self.consensus.request_flight_status(requester, key).await;
        self.reply("fetch_flight_status", result)
    }

    pub fn register_oracle(
        &self,
        oracle: Address,
        fee: Decimal,
    ) -> Reply<[OracleIndex; INDICES_PER_ORACLE]> {
        self.reply("register_oracle", self.consensus.register_oracle(oracle, fee))
    }

    /// Indices assigned to the calling oracle
    pub fn oracle_indices(&self, oracle: Address) -> Reply<[OracleIndex; INDICES_PER_ORACLE]> {
        let result = self
            .ledger
            .check_role(&oracle, Role::Oracle)
            .and_then(|()| {
                self.consensus.oracle_indices(&oracle).ok_or_else(|| {
                    FlightSuretyError::Internal(format!(
                        "oracle {oracle} has no indices"
                    ))
                })
            });
        self.reply("oracle_indices", result)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_oracle_response(
        &self,
        oracle: Address,
        index: OracleIndex,
        airline: Address,
        flight: &str,
        timestamp: u64,
        status_code: u8,
    ) -> Reply<ResponseOutcome> {
        let key = FlightKey::new(airline, flight, timestamp);
        self.reply(
            "submit_oracle_response",
            self.consensus
                .submit_oracle_response(oracle, index, key, status_code),
        )
    }

    /// Owner-only abandonment of an open request
    pub fn abandon_request(&self, caller: Address, key: &OracleRequestKey) -> Reply<()> {
        self.reply("abandon_request", self.consensus.abandon_request(&caller, key))
    }

    /// Abandon requests older than the configured timeout
    pub fn cleanup_timeouts(&self) -> usize {
        self.consensus.cleanup_timeouts()
    }

    /// Release response tallies of finished requests
    pub fn compact_requests(&self) -> usize {
        self.consensus.compact_finished()
    }

    /// Journal events appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEntry> {
        self.ledger.journal().subscribe()
    }
}
