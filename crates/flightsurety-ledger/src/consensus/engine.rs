//! Oracle Consensus Engine
//!
//! Coordinates flight-status resolution:
//! 1. Registers oracles and assigns their indices
//! 2. Opens status requests and dispatches them to the oracle pool
//! 3. Collects independent responses per request key
//! 4. Settles policies once one status reaches the response threshold
//!
//! Responses for one key are serialized by that key's map entry, so the
//! first status to reach the threshold is well defined under parallel
//! delivery. Requests never reopen once they leave `Open`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flightsurety_common::{
    Address, ConsensusOutcome, FlightKey, FlightStatus, Oracle, OracleError, OracleIndex,
    OracleRequestKey, RequestHandle, RequestState, Result, Role, INDICES_PER_ORACLE,
    ORACLE_INDEX_RANGE,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::channel::OracleChannel;
use super::oracle::IndexGenerator;
use super::quorum::{ResponseTally, TallyOutcome};
use crate::insurance::{PolicyManager, SettlementSummary};
use crate::ledger::events::{amount, now};
use crate::ledger::{Ledger, LedgerEvent};

/// Receives the consensus outcome of a flight
pub trait SettlementHandler: Send + Sync {
    fn settle(
        &self,
        caller: &Address,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> Result<SettlementSummary>;
}

impl SettlementHandler for PolicyManager {
    fn settle(
        &self,
        caller: &Address,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> Result<SettlementSummary> {
        self.settle_policies(caller, flight, status)
    }
}

/// One status request and its responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub handle: RequestHandle,
    pub state: RequestState,
    pub tally: ResponseTally,
    pub outcome: Option<ConsensusOutcome>,
}

impl OracleRequest {
    fn new(handle: RequestHandle, threshold: usize) -> Self {
        Self {
            handle,
            state: RequestState::Open,
            tally: ResponseTally::new(threshold),
            outcome: None,
        }
    }
}

/// Result of an accepted oracle response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Counted, threshold not reached for this status
    Recorded {
        status: FlightStatus,
        count: usize,
        threshold: usize,
    },
    /// This response finalized the request
    Finalized {
        outcome: ConsensusOutcome,
        summary: SettlementSummary,
    },
}

/// Oracle consensus engine
pub struct OracleConsensusEngine {
    ledger: Arc<Ledger>,
    settlement: Arc<dyn SettlementHandler>,
    channel: Arc<dyn OracleChannel>,
    /// Caller identity presented to settlement
    identity: Address,
    indices: IndexGenerator,
    /// Every request ever opened. Finished entries stay as tombstones so a
    /// key never reopens; `compact_finished` releases their tallies.
    requests: DashMap<OracleRequestKey, OracleRequest>,
}

impl OracleConsensusEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        settlement: Arc<dyn SettlementHandler>,
        channel: Arc<dyn OracleChannel>,
        identity: Address,
    ) -> Self {
        Self {
            ledger,
            settlement,
            channel,
            identity,
            indices: IndexGenerator::new(ORACLE_INDEX_RANGE),
            requests: DashMap::new(),
        }
    }

    pub(crate) fn identity(&self) -> Address {
        self.identity
    }

    /// Register an oracle and assign its indices
    #[instrument(skip_all, fields(oracle = %address))]
    pub fn register_oracle(
        &self,
        address: Address,
        fee: Decimal,
    ) -> Result<[OracleIndex; INDICES_PER_ORACLE]> {
        self.ledger.check_operational()?;

        let required = self.ledger.config().oracle_registration_fee;
        if fee < required {
            return Err(OracleError::InsufficientFee { fee, required }.into());
        }

        let indices = match self.ledger.state().oracles.entry(address) {
            Entry::Occupied(_) => {
                return Err(OracleError::AlreadyRegistered { oracle: address }.into())
            }
            Entry::Vacant(slot) => {
                let indices = self.indices.assign(self.ledger.journal().height(), &address);
                slot.insert(Oracle::new(address, indices, fee));
                indices
            }
        };

        self.ledger.state().deposit(fee);
        self.ledger.metrics().oracles_registered.inc();
        self.ledger.journal().append(LedgerEvent::OracleRegistered {
            oracle: address,
            indices: indices.to_vec(),
            timestamp: now(),
        });
        info!(indices = ?indices, fee = %amount(fee), "Oracle registered");
        Ok(indices)
    }

    /// Open a status request for `flight` and hand it to the oracle pool
    ///
    /// An identical key that is still open is dispatched again and its
    /// existing handle returned.
    #[instrument(skip_all, fields(requester = %requester, flight = %flight))]
    pub async fn request_flight_status(
        &self,
        requester: Address,
        flight: FlightKey,
    ) -> Result<RequestHandle> {
        self.ledger.check_operational()?;

        let index = self
            .indices
            .next_index(self.ledger.journal().height(), &requester);
        let key = OracleRequestKey::new(index, flight);
        let threshold = self.ledger.config().min_oracle_responses;

        let (handle, opened) = match self.requests.entry(key.clone()) {
            Entry::Occupied(existing) => {
                let request = existing.get();
                if !request.state.accepts_responses() {
                    return Err(OracleError::RequestClosed {
                        key,
                        state: request.state,
                    }
                    .into());
                }
                (request.handle.clone(), false)
            }
            Entry::Vacant(slot) => {
                let handle = RequestHandle {
                    id: key.id(),
                    key: key.clone(),
                    requester,
                    opened_at: now(),
                };
                slot.insert(OracleRequest::new(handle.clone(), threshold));
                (handle, true)
            }
        };

        if opened {
            self.ledger.metrics().requests_open.inc();
            self.ledger.journal().append(LedgerEvent::OracleRequested {
                request: key.clone(),
                requester,
                timestamp: handle.opened_at,
            });
            info!(request = %key, "Status request opened");
        } else {
            debug!(request = %key, "Status request already open");
        }

        self.channel.dispatch(&handle).await?;
        Ok(handle)
    }

    /// Record one oracle's report for a request
    #[instrument(skip_all, fields(oracle = %oracle, index = index, flight = %flight, code = code))]
    pub fn submit_oracle_response(
        &self,
        oracle: Address,
        index: OracleIndex,
        flight: FlightKey,
        code: u8,
    ) -> Result<ResponseOutcome> {
        self.ledger.guard(&oracle, Role::Oracle)?;

        let registered = self
            .ledger
            .state()
            .oracle(&oracle)
            .ok_or(OracleError::IndexMismatch { oracle, index })?;
        if !registered.has_index(index) {
            return Err(OracleError::IndexMismatch { oracle, index }.into());
        }
        let status = FlightStatus::try_from(code)?;

        let key = OracleRequestKey::new(index, flight);
        let mut request = self
            .requests
            .get_mut(&key)
            .ok_or_else(|| OracleError::UnknownRequest { key: key.clone() })?;
        if !request.state.accepts_responses() {
            return Err(OracleError::RequestClosed {
                key,
                state: request.state,
            }
            .into());
        }

        match request.tally.record(oracle, status) {
            TallyOutcome::Duplicate => Err(OracleError::DuplicateResponse { oracle, key }.into()),
            TallyOutcome::Counted { count } => {
                self.record_report(&key, oracle, status);
                let threshold = request.tally.threshold();
                debug!(status = %status, count, threshold, "Oracle response recorded");
                Ok(ResponseOutcome::Recorded {
                    status,
                    count,
                    threshold,
                })
            }
            TallyOutcome::Reached => {
                request.state = RequestState::ConsensusReached;
                let summary = match self.settlement.settle(&self.identity, &key.flight, status) {
                    Ok(summary) => summary,
                    Err(e) => {
                        request.tally.withdraw(&oracle, status);
                        request.state = RequestState::Open;
                        warn!(status = %status, error = %e, "Settlement failed, request stays open");
                        return Err(e);
                    }
                };

                let outcome = ConsensusOutcome {
                    status,
                    agreeing: request.tally.reporters(status).to_vec(),
                    finalized_at: now(),
                };
                request.outcome = Some(outcome.clone());
                request.state = RequestState::Closed;

                self.record_report(&key, oracle, status);
                self.ledger.metrics().consensus_reached.inc();
                self.ledger.metrics().requests_open.dec();
                self.ledger.journal().append(LedgerEvent::ConsensusReached {
                    request: key.clone(),
                    status,
                    agreeing: outcome.agreeing.clone(),
                    timestamp: outcome.finalized_at,
                });
                info!(
                    request = %key,
                    status = %status,
                    credited = summary.credited,
                    expired = summary.expired,
                    "Consensus reached"
                );
                Ok(ResponseOutcome::Finalized { outcome, summary })
            }
        }
    }

    fn record_report(&self, key: &OracleRequestKey, oracle: Address, status: FlightStatus) {
        self.ledger.metrics().oracle_responses.inc();
        self.ledger.journal().append(LedgerEvent::OracleReportReceived {
            request: key.clone(),
            oracle,
            status,
            timestamp: now(),
        });
    }

    /// Owner-only: mark an open request Abandoned
    #[instrument(skip_all, fields(request = %key))]
    pub fn abandon_request(&self, caller: &Address, key: &OracleRequestKey) -> Result<()> {
        self.ledger.check_role(caller, Role::Owner)?;

        let mut request = self
            .requests
            .get_mut(key)
            .ok_or_else(|| OracleError::UnknownRequest { key: key.clone() })?;
        if !request.state.accepts_responses() {
            return Err(OracleError::RequestClosed {
                key: key.clone(),
                state: request.state,
            }
            .into());
        }
        request.state = RequestState::Abandoned;
        drop(request);

        self.mark_abandoned(key);
        Ok(())
    }

    /// Abandon every open request older than `max_age`
    pub fn abandon_expired(&self, max_age: Duration) -> usize {
        let max_age = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now().saturating_sub(max_age);

        let mut expired = Vec::new();
        for mut request in self.requests.iter_mut() {
            if request.state == RequestState::Open && request.handle.opened_at < cutoff {
                request.state = RequestState::Abandoned;
                expired.push(request.key().clone());
            }
        }

        for key in &expired {
            warn!(request = %key, "Status request timed out");
            self.mark_abandoned(key);
        }
        expired.len()
    }

    /// Abandon open requests older than the configured timeout
    pub fn cleanup_timeouts(&self) -> usize {
        self.abandon_expired(self.ledger.config().request_timeout())
    }

    /// Release the response tallies of Closed and Abandoned requests
    ///
    /// The entries themselves remain, holding state and outcome, so a
    /// finished key still rejects responses and re-requests.
    pub fn compact_finished(&self) -> usize {
        let mut compacted = 0;
        for mut request in self.requests.iter_mut() {
            let finished = matches!(request.state, RequestState::Closed | RequestState::Abandoned);
            if finished && request.tally.total_responses() > 0 {
                request.tally.clear();
                compacted += 1;
            }
        }
        if compacted > 0 {
            debug!(compacted, "Finished request tallies released");
        }
        compacted
    }

    fn mark_abandoned(&self, key: &OracleRequestKey) {
        self.ledger.metrics().requests_open.dec();
        self.ledger.journal().append(LedgerEvent::RequestAbandoned {
            request: key.clone(),
            timestamp: now(),
        });
    }

    pub fn oracle_indices(&self, oracle: &Address) -> Option<[OracleIndex; INDICES_PER_ORACLE]> {
        self.ledger.state().oracle(oracle).map(|o| o.indices)
    }

    pub fn request(&self, key: &OracleRequestKey) -> Option<OracleRequest> {
        self.requests.get(key).map(|r| r.clone())
    }

    pub fn open_requests(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| r.state == RequestState::Open)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::channel::InMemoryOracleChannel;
    use crate::governance::AirlineGovernance;
    use crate::insurance::InMemoryPayoutGateway;
    use crate::ledger::testing::{first_airline, ledger, owner};
    use flightsurety_common::{ErrorKind, PolicyStatus};
    use rust_decimal_macros::dec;

    struct Fixture {
        engine: OracleConsensusEngine,
        policies: Arc<PolicyManager>,
        flight: FlightKey,
    }

    fn fixture() -> Fixture {
        let ledger = ledger();
        let gov = AirlineGovernance::new(ledger.clone());
        gov.fund_airline(first_airline(), dec!(10)).unwrap();
        let flight = gov.register_flight(first_airline(), "ND1309", 1_700_000_000).unwrap();

        let identity = Address::derive("engine");
        ledger.authorize_caller(identity, &owner()).unwrap();
        let policies = Arc::new(PolicyManager::new(
            ledger.clone(),
            Arc::new(InMemoryPayoutGateway::new()),
        ));
        let engine = OracleConsensusEngine::new(
            ledger,
            policies.clone(),
            Arc::new(InMemoryOracleChannel::default()),
            identity,
        );
        Fixture {
            engine,
            policies,
            flight,
        }
    }

    /// Register oracles until `n` of them hold `index`
    fn oracles_for(engine: &OracleConsensusEngine, index: OracleIndex, n: usize) -> Vec<Address> {
        let mut holders = Vec::new();
        for i in 0..1000 {
            let oracle = Address::derive(&format!("oracle-{i}"));
            let indices = engine.register_oracle(oracle, dec!(1)).unwrap();
            if indices.contains(&index) {
                holders.push(oracle);
                if holders.len() == n {
                    return holders;
                }
            }
        }
        panic!("not enough oracles for index {index}");
    }

    #[test]
    fn test_register_oracle() {
        let f = fixture();
        let oracle = Address::derive("oracle");

        let err = f.engine.register_oracle(oracle, dec!(0.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFee);

        let indices = f.engine.register_oracle(oracle, dec!(1)).unwrap();
        assert_eq!(f.engine.oracle_indices(&oracle), Some(indices));

        let err = f.engine.register_oracle(oracle, dec!(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OracleAlreadyRegistered);
    }

    #[tokio::test]
    async fn test_response_validation() {
        let f = fixture();
        let handle = f
            .engine
            .request_flight_status(Address::derive("passenger"), f.flight.clone())
            .await
            .unwrap();
        let index = handle.key.index;
        let oracles = oracles_for(&f.engine, index, 1);
        let oracle = oracles[0];

        let stranger = Address::derive("stranger");
        let err = f
            .engine
            .submit_oracle_response(stranger, index, f.flight.clone(), 20)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let indices = f.engine.oracle_indices(&oracle).unwrap();
        let foreign = (0..10).find(|i| !indices.contains(i)).unwrap();
        let err = f
            .engine
            .submit_oracle_response(oracle, foreign, f.flight.clone(), 20)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexMismatch);

        let err = f
            .engine
            .submit_oracle_response(oracle, index, f.flight.clone(), 21)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatusCode);

        let other = FlightKey::new(first_airline(), "XX0000", 1);
        let err = f
            .engine
            .submit_oracle_response(oracle, index, other, 20)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRequest);

        f.engine
            .submit_oracle_response(oracle, index, f.flight.clone(), 20)
            .unwrap();
        let err = f
            .engine
            .submit_oracle_response(oracle, index, f.flight.clone(), 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateResponse);
    }

    #[tokio::test]
    async fn test_consensus_settles_and_closes() {
        let f = fixture();
        let passenger = Address::derive("passenger");
        f.policies
            .buy_policy(passenger, f.flight.clone(), dec!(1))
            .unwrap();

        let handle = f
            .engine
            .request_flight_status(passenger, f.flight.clone())
            .await
            .unwrap();
        let index = handle.key.index;
        let oracles = oracles_for(&f.engine, index, 4);

        for oracle in &oracles[..2] {
            let outcome = f
                .engine
                .submit_oracle_response(*oracle, index, f.flight.clone(), 20)
                .unwrap();
            assert!(matches!(outcome, ResponseOutcome::Recorded { .. }));
        }
        let outcome = f
            .engine
            .submit_oracle_response(oracles[2], index, f.flight.clone(), 20)
            .unwrap();
        match outcome {
            ResponseOutcome::Finalized { outcome, summary } => {
                assert_eq!(outcome.status, FlightStatus::LateAirline);
                assert_eq!(outcome.agreeing, oracles[..3].to_vec());
                assert_eq!(summary.credited, 1);
            }
            other => panic!("expected finalization, got {other:?}"),
        }

        assert_eq!(f.policies.credit_of(&passenger), dec!(1.5));
        assert_eq!(
            f.policies.policy(&passenger, &f.flight).unwrap().status,
            PolicyStatus::Settled
        );
        assert_eq!(f.engine.request(&handle.key).unwrap().state, RequestState::Closed);

        let err = f
            .engine
            .submit_oracle_response(oracles[3], index, f.flight.clone(), 40)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestClosed);
    }

    #[tokio::test]
    async fn test_failed_settlement_keeps_request_open() {
        let f = fixture();
        let handle = f
            .engine
            .request_flight_status(Address::derive("passenger"), f.flight.clone())
            .await
            .unwrap();
        let index = handle.key.index;
        let oracles = oracles_for(&f.engine, index, 3);

        // Revoke the engine's settlement right
        f.engine
            .ledger
            .deauthorize_caller(&f.engine.identity(), &owner())
            .unwrap();

        for oracle in &oracles[..2] {
            f.engine
                .submit_oracle_response(*oracle, index, f.flight.clone(), 10)
                .unwrap();
        }
        let err = f
            .engine
            .submit_oracle_response(oracles[2], index, f.flight.clone(), 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let request = f.engine.request(&handle.key).unwrap();
        assert_eq!(request.state, RequestState::Open);
        assert!(!request.tally.has_responded(&oracles[2]));

        f.engine
            .ledger
            .authorize_caller(f.engine.identity(), &owner())
            .unwrap();
        let outcome = f
            .engine
            .submit_oracle_response(oracles[2], index, f.flight.clone(), 10)
            .unwrap();
        assert!(matches!(outcome, ResponseOutcome::Finalized { .. }));
    }

    #[tokio::test]
    async fn test_abandon_request() {
        let f = fixture();
        let handle = f
            .engine
            .request_flight_status(Address::derive("passenger"), f.flight.clone())
            .await
            .unwrap();

        let err = f
            .engine
            .abandon_request(&Address::derive("passenger"), &handle.key)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        f.engine.abandon_request(&owner(), &handle.key).unwrap();
        assert_eq!(f.engine.request(&handle.key).unwrap().state, RequestState::Abandoned);

        let err = f.engine.abandon_request(&owner(), &handle.key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestClosed);
        assert_eq!(f.engine.open_requests(), 0);
    }

    #[tokio::test]
    async fn test_abandon_expired_only_touches_old_requests() {
        let f = fixture();
        let handle = f
            .engine
            .request_flight_status(Address::derive("passenger"), f.flight.clone())
            .await
            .unwrap();

        assert_eq!(f.engine.abandon_expired(Duration::from_secs(3600)), 0);
        f.engine.requests.get_mut(&handle.key).unwrap().handle.opened_at -= 10_000;
        assert_eq!(f.engine.abandon_expired(Duration::from_secs(5)), 1);
        assert_eq!(f.engine.request(&handle.key).unwrap().state, RequestState::Abandoned);
    }

    #[tokio::test]
    async fn test_abandon_expired_saturates_huge_ages() {
        let f = fixture();
        let handle = f
            .engine
            .request_flight_status(Address::derive("passenger"), f.flight.clone())
            .await
            .unwrap();

        assert_eq!(f.engine.abandon_expired(Duration::MAX), 0);
        assert_eq!(f.engine.abandon_expired(Duration::from_secs(u64::MAX)), 0);
        assert_eq!(f.engine.request(&handle.key).unwrap().state, RequestState::Open);
        assert_eq!(f.engine.open_requests(), 1);
    }

    #[tokio::test]
    async fn test_compact_finished_keeps_tombstones() {
        let f = fixture();
        let passenger = Address::derive("passenger");
        let handle = f
            .engine
            .request_flight_status(passenger, f.flight.clone())
            .await
            .unwrap();
        let index = handle.key.index;
        let oracles = oracles_for(&f.engine, index, 4);
        for oracle in &oracles[..3] {
            f.engine
                .submit_oracle_response(*oracle, index, f.flight.clone(), 10)
                .unwrap();
        }

        assert_eq!(f.engine.compact_finished(), 1);
        assert_eq!(f.engine.compact_finished(), 0);

        let request = f.engine.request(&handle.key).unwrap();
        assert_eq!(request.state, RequestState::Closed);
        assert_eq!(request.tally.total_responses(), 0);
        assert_eq!(request.outcome.unwrap().agreeing.len(), 3);

        let err = f
            .engine
            .submit_oracle_response(oracles[3], index, f.flight.clone(), 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestClosed);
        assert_eq!(f.engine.open_requests(), 0);
    }
}
