//! Insurance policy management

pub mod book;
pub mod payout;

pub use book::{PolicyManager, SettlementSummary};
pub use payout::{InMemoryPayoutGateway, PayoutGateway};
