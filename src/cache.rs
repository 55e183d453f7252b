//! Notification Cache
//!
//! Dedup ledger keyed by (transaction hash, device token). A pair that is
//! already recorded must not be pushed again, even when the node stream
//! redelivers an event or one transaction matches several of a device's
//! addresses. `claim` is the serialization point when events are processed
//! concurrently.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Ledger of already-notified (transaction, device) pairs
#[async_trait]
pub trait NotificationCache: Send + Sync {
    /// Has this pair already been notified?
    async fn was_sent(&self, tx_hash: &str, device_token: &str) -> anyhow::Result<bool>;

    /// Record the pair as notified
    async fn mark_sent(&self, tx_hash: &str, device_token: &str) -> anyhow::Result<()>;

    /// Check-and-mark in one step, returning `true` exactly once per pair
    ///
    /// The provided implementation is a plain read-then-write and is only
    /// race-free for single-worker processing; backends serving concurrent
    /// workers must override it with an atomic operation.
    async fn claim(&self, tx_hash: &str, device_token: &str) -> anyhow::Result<bool> {
        if self.was_sent(tx_hash, device_token).await? {
            return Ok(false);
        }
        self.mark_sent(tx_hash, device_token).await?;
        Ok(true)
    }
}

/// Default cache: an in-process set with no eviction
///
/// Grows with every notified pair for the lifetime of the engine. Deployments
/// that run against busy chains are expected to supply a bounded or
/// externally persisted implementation instead.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    sent: Mutex<HashSet<(String, String)>>,
}

impl InMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded pairs
    pub async fn len(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// True when no pair has been recorded
    pub async fn is_empty(&self) -> bool {
        self.sent.lock().await.is_empty()
    }
}

#[async_trait]
impl NotificationCache for InMemoryCache {
    async fn was_sent(&self, tx_hash: &str, device_token: &str) -> anyhow::Result<bool> {
        let key = (tx_hash.to_string(), device_token.to_string());
        Ok(self.sent.lock().await.contains(&key))
    }

    async fn mark_sent(&self, tx_hash: &str, device_token: &str) -> anyhow::Result<()> {
        let key = (tx_hash.to_string(), device_token.to_string());
        self.sent.lock().await.insert(key);
        Ok(())
    }

    // Single insert under one lock acquisition, so concurrent claimants of
    // the same pair see exactly one winner.
    async fn claim(&self, tx_hash: &str, device_token: &str) -> anyhow::Result<bool> {
        let key = (tx_hash.to_string(), device_token.to_string());
        Ok(self.sent.lock().await.insert(key))
    }
}
