//! # FlightSurety Ledger
//!
//! Flight-delay insurance marketplace: airlines govern their own membership,
//! passengers insure flights, and independent oracles agree on flight status
//! before policies are settled.
//!
//! ## Components
//!
//! - **Ledger**: state store, access guard, event journal, metrics
//! - **Governance**: airline admission by direct registration or vote, funding, flights
//! - **Insurance**: policy purchase, settlement on consensus, credit withdrawal
//! - **Consensus**: oracle registration, status requests, response tallying
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FlightSurety                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────────────┐ │
//! │  │ Governance │   │  Insurance  │◀──│  Oracle Consensus    │ │
//! │  │ (airlines) │   │  (policies) │   │ (requests, tallies)  │ │
//! │  └─────┬──────┘   └──────┬──────┘   └──────────┬───────────┘ │
//! │        └─────────────────┼─────────────────────┘             │
//! │                   ┌──────┴──────┐                            │
//! │                   │   Ledger    │                            │
//! │                   └─────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod consensus;
pub mod governance;
pub mod insurance;
pub mod ledger;
pub mod metrics;
pub mod service;

pub use config::LedgerConfig;
pub use consensus::{
    InMemoryOracleChannel, OracleChannel, OracleConsensusEngine, OracleRequest, ResponseOutcome,
    SettlementHandler,
};
pub use governance::{Admission, AirlineGovernance};
pub use insurance::{InMemoryPayoutGateway, PayoutGateway, PolicyManager, SettlementSummary};
pub use ledger::{EventJournal, JournalEntry, Ledger, LedgerEvent};
pub use metrics::LedgerMetrics;
pub use service::{FlightSurety, Reply};
