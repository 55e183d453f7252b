//! Node Connection
//!
//! Dials the node's WebSocket endpoint twice: one connection carries the
//! event subscriptions, the other serves on-demand lookups issued while
//! events are being processed, so a slow block fetch never contends with
//! stream intake. Startup failures are fatal here; reconnect policy belongs
//! to the layer above.

use alloy::providers::{ProviderBuilder, RootProvider};
use alloy::pubsub::PubSubFrontend;
use alloy::transports::ws::WsConnect;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while establishing the node connections
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("node endpoint cannot be blank")]
    BlankEndpoint,

    #[error("failed to connect to {url}: {reason}")]
    Dial { url: String, reason: String },
}

/// Reject empty or whitespace-only endpoint strings
pub fn validate_endpoint(url: &str) -> Result<(), ConnectionError> {
    if url.trim().is_empty() {
        return Err(ConnectionError::BlankEndpoint);
    }
    Ok(())
}

/// The engine's two persistent connections to one node endpoint
pub struct NodeConnection {
    events: RootProvider<PubSubFrontend>,
    lookup: RootProvider<PubSubFrontend>,
}

impl NodeConnection {
    /// Connect both providers to `url`, failing fast on a blank endpoint or
    /// an unreachable node
    pub async fn connect(url: &str) -> Result<Self, ConnectionError> {
        validate_endpoint(url)?;

        info!("connecting to node at {}", url);
        let events = dial(url).await?;
        let lookup = dial(url).await?;
        info!("connected to node at {}", url);

        Ok(Self { events, lookup })
    }

    /// The connection reserved for event subscriptions
    pub(crate) fn events(&self) -> RootProvider<PubSubFrontend> {
        self.events.clone()
    }

    /// The connection reserved for auxiliary lookups
    pub(crate) fn lookup(&self) -> RootProvider<PubSubFrontend> {
        self.lookup.clone()
    }
}

async fn dial(url: &str) -> Result<RootProvider<PubSubFrontend>, ConnectionError> {
    ProviderBuilder::new()
        .on_ws(WsConnect::new(url))
        .await
        .map_err(|e| ConnectionError::Dial {
            url: url.to_string(),
            reason: e.to_string(),
        })
}
