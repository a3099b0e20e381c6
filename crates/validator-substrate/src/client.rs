//! Substrate client lifecycle (spec §4.B, §9): an explicit state machine
//! rather than a hidden global. The orchestrator owns the single instance
//! and is the only caller permitted to mutate its connection; query calls
//! borrow it read-only and can run concurrently (spec §5 "shared
//! resources").

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use subxt::{OnlineClient, PolkadotConfig};
use tracing::{info, warn};

use crate::error::{Result, SubstrateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Connecting,
    Ready,
    Reconnecting,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientState::Uninitialized => "uninitialized",
            ClientState::Connecting => "connecting",
            ClientState::Ready => "ready",
            ClientState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

struct Inner {
    endpoint: Option<String>,
    client: Option<OnlineClient<PolkadotConfig>>,
    state: ClientState,
}

/// Process-wide substrate connection. `initialize` is idempotent for a
/// matching endpoint; calling it again with a different endpoint tears
/// down and reconnects (spec §4.B).
pub struct SubstrateClient {
    inner: RwLock<Inner>,
    max_reconnect_attempts: u32,
    reconnect_base_delay: Duration,
}

impl SubstrateClient {
    pub fn new(max_reconnect_attempts: u32, reconnect_base_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                endpoint: None,
                client: None,
                state: ClientState::Uninitialized,
            }),
            max_reconnect_attempts,
            reconnect_base_delay,
        })
    }

    pub fn state(&self) -> ClientState {
        self.inner.read().state
    }

    /// Connects to `endpoint`, or is a no-op if already connected to it.
    /// A different endpoint tears the old connection down first.
    pub async fn initialize(&self, endpoint: &str) -> Result<()> {
        {
            let guard = self.inner.read();
            if guard.state == ClientState::Ready && guard.endpoint.as_deref() == Some(endpoint) {
                return Ok(());
            }
        }
        self.connect(endpoint).await
    }

    async fn connect(&self, endpoint: &str) -> Result<()> {
        self.inner.write().state = ClientState::Connecting;
        let client = OnlineClient::<PolkadotConfig>::from_url(endpoint)
            .await
            .map_err(|e| SubstrateError::Connection {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        let mut guard = self.inner.write();
        guard.endpoint = Some(endpoint.to_string());
        guard.client = Some(client);
        guard.state = ClientState::Ready;
        info!(endpoint, "substrate client ready");
        Ok(())
    }

    /// Reconnects with exponential backoff, bounded by
    /// `max_reconnect_attempts`. Called by the health-check loop on a
    /// detected disconnect.
    pub async fn reconnect(&self) -> Result<()> {
        let endpoint = self
            .inner
            .read()
            .endpoint
            .clone()
            .ok_or_else(|| SubstrateError::NotReady {
                state: ClientState::Uninitialized.to_string(),
            })?;
        self.inner.write().state = ClientState::Reconnecting;

        let mut delay = self.reconnect_base_delay;
        for attempt in 1..=self.max_reconnect_attempts {
            match self.connect(&endpoint).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(attempt, max = self.max_reconnect_attempts, error = %err, "reconnect attempt failed");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
        Err(SubstrateError::Connection {
            endpoint,
            message: format!("exhausted {} reconnect attempts", self.max_reconnect_attempts),
        })
    }

    pub(crate) fn handle(&self) -> Result<OnlineClient<PolkadotConfig>> {
        let guard = self.inner.read();
        guard.client.clone().ok_or_else(|| SubstrateError::NotReady {
            state: guard.state.to_string(),
        })
    }

    /// Pings the chain head; on failure triggers a bounded reconnect. Meant
    /// to be driven by the orchestrator every 30s (spec §4.B).
    pub async fn health_check(&self) {
        let client = match self.handle() {
            Ok(c) => c,
            Err(_) => return,
        };
        if client.blocks().at_latest().await.is_err() {
            warn!("substrate health check failed, reconnecting");
            if let Err(err) = self.reconnect().await {
                warn!(error = %err, "health-check reconnect failed");
            }
        }
    }

    /// Drops the underlying connection. Called on graceful shutdown.
    pub fn close(&self) {
        let mut guard = self.inner.write();
        guard.client = None;
        guard.state = ClientState::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let client = SubstrateClient::new(3, Duration::from_millis(1));
        assert_eq!(client.state(), ClientState::Uninitialized);
    }

    #[test]
    fn close_resets_state() {
        let client = SubstrateClient::new(3, Duration::from_millis(1));
        client.close();
        assert_eq!(client.state(), ClientState::Uninitialized);
    }
}
