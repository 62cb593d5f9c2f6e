//! Delivery of status requests to oracle operators
//!
//! Transport is external; the engine only needs to hand each opened request
//! to whatever carries it to the oracle pool.

use async_trait::async_trait;
use flightsurety_common::{FlightSuretyError, RequestHandle, Result};
use tokio::sync::broadcast;
use tracing::debug;

/// Outbound request channel to the oracle pool
#[async_trait]
pub trait OracleChannel: Send + Sync {
    /// Publish an opened request
    async fn dispatch(&self, request: &RequestHandle) -> Result<()>;
}

/// In-process channel for simulators and tests
pub struct InMemoryOracleChannel {
    tx: broadcast::Sender<RequestHandle>,
}

impl InMemoryOracleChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RequestHandle> {
        self.tx.subscribe()
    }
}

impl Default for InMemoryOracleChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl OracleChannel for InMemoryOracleChannel {
    async fn dispatch(&self, request: &RequestHandle) -> Result<()> {
        if self.tx.receiver_count() == 0 {
            debug!(request = %request.key, "No oracle listeners attached");
            return Ok(());
        }
        self.tx
            .send(request.clone())
            .map(|_| ())
            .map_err(|e| FlightSuretyError::Channel(format!("dispatch failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightsurety_common::{Address, FlightKey, OracleRequestKey};

    fn handle() -> RequestHandle {
        let key = OracleRequestKey::new(3, FlightKey::new(Address::derive("a"), "ND1309", 1));
        RequestHandle {
            id: key.id(),
            key,
            requester: Address::derive("passenger"),
            opened_at: 0,
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_subscribers() {
        let channel = InMemoryOracleChannel::new(8);
        let mut rx = channel.subscribe();
        channel.dispatch(&handle()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), handle());
    }

    #[tokio::test]
    async fn test_dispatch_without_listeners_is_ok() {
        let channel = InMemoryOracleChannel::default();
        assert!(channel.dispatch(&handle()).await.is_ok());
    }
}
