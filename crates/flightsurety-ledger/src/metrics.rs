//! Prometheus metrics for the ledger

use flightsurety_common::ErrorKind;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Ledger counters, registered on a caller-supplied registry
pub struct LedgerMetrics {
    pub airlines_registered: IntCounter,
    pub airline_votes: IntCounter,
    pub airlines_funded: IntCounter,
    pub flights_registered: IntCounter,
    pub policies_purchased: IntCounter,
    pub policies_credited: IntCounter,
    pub policies_expired: IntCounter,
    pub credits_withdrawn: IntCounter,
    pub oracles_registered: IntCounter,
    pub oracle_responses: IntCounter,
    pub consensus_reached: IntCounter,
    pub requests_open: IntGauge,
    pub rejections: IntCounterVec,
}

impl LedgerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            airlines_registered: IntCounter::new(
                "flightsurety_airlines_registered_total",
                "Airlines admitted to the registry",
            )?,
            airline_votes: IntCounter::new(
                "flightsurety_airline_votes_total",
                "Admission votes recorded",
            )?,
            airlines_funded: IntCounter::new(
                "flightsurety_airlines_funded_total",
                "Airlines that reached the funding minimum",
            )?,
            flights_registered: IntCounter::new(
                "flightsurety_flights_registered_total",
                "Flights registered by funded airlines",
            )?,
            policies_purchased: IntCounter::new(
                "flightsurety_policies_purchased_total",
                "Insurance policies sold",
            )?,
            policies_credited: IntCounter::new(
                "flightsurety_policies_credited_total",
                "Policies settled with a payout",
            )?,
            policies_expired: IntCounter::new(
                "flightsurety_policies_expired_total",
                "Policies closed without a payout",
            )?,
            credits_withdrawn: IntCounter::new(
                "flightsurety_credits_withdrawn_total",
                "Successful credit withdrawals",
            )?,
            oracles_registered: IntCounter::new(
                "flightsurety_oracles_registered_total",
                "Registered oracles",
            )?,
            oracle_responses: IntCounter::new(
                "flightsurety_oracle_responses_total",
                "Accepted oracle responses",
            )?,
            consensus_reached: IntCounter::new(
                "flightsurety_consensus_reached_total",
                "Status requests finalized by consensus",
            )?,
            requests_open: IntGauge::new(
                "flightsurety_requests_open",
                "Status requests currently open",
            )?,
            rejections: IntCounterVec::new(
                Opts::new("flightsurety_rejections_total", "Rejected operations by error kind"),
                &["kind"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.airlines_registered.clone()))?;
        registry.register(Box::new(self.airline_votes.clone()))?;
        registry.register(Box::new(self.airlines_funded.clone()))?;
        registry.register(Box::new(self.flights_registered.clone()))?;
        registry.register(Box::new(self.policies_purchased.clone()))?;
        registry.register(Box::new(self.policies_credited.clone()))?;
        registry.register(Box::new(self.policies_expired.clone()))?;
        registry.register(Box::new(self.credits_withdrawn.clone()))?;
        registry.register(Box::new(self.oracles_registered.clone()))?;
        registry.register(Box::new(self.oracle_responses.clone()))?;
        registry.register(Box::new(self.consensus_reached.clone()))?;
        registry.register(Box::new(self.requests_open.clone()))?;
        registry.register(Box::new(self.rejections.clone()))?;
        Ok(())
    }

    pub fn record_rejection(&self, kind: ErrorKind) {
        self.rejections
            .with_label_values(&[&kind.to_string()])
            .inc();
    }
}
