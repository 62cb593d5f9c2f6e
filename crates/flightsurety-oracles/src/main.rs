//! FlightSurety oracle fleet binary
//!
//! Boots an in-process marketplace, attaches a simulated oracle fleet, and
//! runs one insured flight through status consensus.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use flightsurety_common::{Address, ErrorReport, VERSION};
use flightsurety_ledger::{FlightSurety, InMemoryOracleChannel, InMemoryPayoutGateway, LedgerConfig};
use flightsurety_oracles::{FleetConfig, OracleFleet};
use prometheus::{Encoder, Registry, TextEncoder};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting FlightSurety oracle fleet v{}", VERSION);

    let config_path = std::env::var("FLIGHTSURETY_CONFIG").ok();
    let ledger_config = LedgerConfig::load(config_path.as_deref())?;
    let fleet_config = FleetConfig::load()?;
    info!("Loaded configuration: {:?}", fleet_config);

    let owner = Address::derive("owner");
    let airline = Address::derive("airline-a");
    let funding = ledger_config.airline_funding_minimum;
    let request_timeout = ledger_config.request_timeout();

    let channel = Arc::new(InMemoryOracleChannel::default());
    let service = Arc::new(FlightSurety::new(
        ledger_config,
        owner,
        airline,
        "Founding Airline",
        channel.clone(),
        Arc::new(InMemoryPayoutGateway::new()),
    )?);

    let registry = Registry::new();
    service.register_metrics(&registry)?;

    let fleet = Arc::new(OracleFleet::bootstrap(service.clone(), &fleet_config)?);
    let requests = channel.subscribe();
    let fleet_task = {
        let fleet = fleet.clone();
        tokio::spawn(async move { fleet.run(requests).await })
    };

    // One insured flight end to end
    let passenger = Address::derive("passenger");
    let timestamp = chrono::Utc::now().timestamp() as u64;
    service.fund_airline(airline, funding).map_err(report)?;
    service
        .register_flight(airline, "ND1309", timestamp)
        .map_err(report)?;
    let receipt = service
        .buy(passenger, "ND1309", timestamp, airline, Decimal::ONE)
        .map_err(report)?;
    info!(policy = %receipt.policy_id, "Policy purchased");

    let handle = service
        .fetch_flight_status(passenger, "ND1309", airline, timestamp)
        .await
        .map_err(report)?;
    info!(request = %handle.key, "Flight status requested");

    let sweep_every = request_timeout.clamp(Duration::from_secs(1), Duration::from_secs(30));
    let mut sweep = tokio::time::interval(sweep_every);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = sweep.tick() => {
                let abandoned = service.cleanup_timeouts();
                if abandoned > 0 {
                    warn!(abandoned, "Abandoned stale status requests");
                }
                service.compact_requests();
                let credit = service.get_passenger_credit(passenger);
                if !credit.is_zero() {
                    let paid = service.withdraw_credits(passenger).await.map_err(report)?;
                    info!(amount = %paid, "Passenger credit withdrawn");
                }
            }
        }
    }

    fleet_task.abort();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    info!("Final metrics:\n{}", String::from_utf8_lossy(&buffer));
    info!("Shutting down oracle fleet");
    Ok(())
}

fn report(err: ErrorReport) -> anyhow::Error {
    anyhow!("{:?}: {}", err.kind, err.message)
}
