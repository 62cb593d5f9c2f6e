//! Oracle consensus: index assignment, request lifecycle, and response tallying

pub mod channel;
pub mod engine;
pub mod oracle;
pub mod quorum;

pub use channel::{InMemoryOracleChannel, OracleChannel};
pub use engine::{OracleConsensusEngine, OracleRequest, ResponseOutcome, SettlementHandler};
pub use oracle::IndexGenerator;
pub use quorum::{ResponseTally, TallyOutcome};
