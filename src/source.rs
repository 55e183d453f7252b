//! Wallet and Token Data Sources
//!
//! Pluggable lookups the engine consumes: which subscribers care about an
//! address, and what token contract sits at an address. Production deployments
//! back these with their own registry; the in-memory defaults keep a fresh
//! engine usable and drive the test suites.

use std::collections::HashMap;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::transaction::TokenMetadata;

/// One device's interest in one wallet address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSubscriber {
    /// Display name of the wallet
    pub wallet_name: String,
    /// Watched address
    pub address: Address,
    /// Push token of the device to notify
    pub device_token: String,
}

/// Registry of wallet subscriptions, consulted per observed transaction
#[async_trait]
pub trait WalletDataSource: Send + Sync {
    /// Register a device's interest in an address
    async fn subscribe_wallet(
        &self,
        wallet_name: &str,
        address: Address,
        device_token: &str,
    ) -> anyhow::Result<()>;

    /// Remove every device subscription for an address
    async fn unsubscribe_wallet_all_device(&self, address: Address) -> anyhow::Result<()>;

    /// Return all subscribers interested in `address`
    async fn subscribers_of(&self, address: Address) -> anyhow::Result<Vec<WalletSubscriber>>;
}

/// Token contract metadata lookup, used to enrich matched transactions
#[async_trait]
pub trait TokenDataSource: Send + Sync {
    /// Return metadata for the contract at `address`, or `None` if it is not
    /// a known token
    async fn token_metadata(&self, address: Address) -> anyhow::Result<Option<TokenMetadata>>;
}

/// Default wallet registry: an in-process map from address to subscribers
#[derive(Debug, Default)]
pub struct InMemoryWalletSource {
    wallets: RwLock<HashMap<Address, Vec<WalletSubscriber>>>,
}

impl InMemoryWalletSource {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletDataSource for InMemoryWalletSource {
    async fn subscribe_wallet(
        &self,
        wallet_name: &str,
        address: Address,
        device_token: &str,
    ) -> anyhow::Result<()> {
        let subscriber = WalletSubscriber {
            wallet_name: wallet_name.to_string(),
            address,
            device_token: device_token.to_string(),
        };
        let mut wallets = self.wallets.write().await;
        let entries = wallets.entry(address).or_default();
        if !entries.contains(&subscriber) {
            entries.push(subscriber);
        }
        Ok(())
    }

    async fn unsubscribe_wallet_all_device(&self, address: Address) -> anyhow::Result<()> {
        self.wallets.write().await.remove(&address);
        Ok(())
    }

    async fn subscribers_of(&self, address: Address) -> anyhow::Result<Vec<WalletSubscriber>> {
        Ok(self
            .wallets
            .read()
            .await
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }
}

/// Default token lookup: a static in-process map, empty unless seeded
#[derive(Debug, Default)]
pub struct InMemoryTokenSource {
    tokens: RwLock<HashMap<Address, TokenMetadata>>,
}

impl InMemoryTokenSource {
    /// Create an empty token map
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the map with a known token contract
    pub async fn insert(&self, metadata: TokenMetadata) {
        self.tokens.write().await.insert(metadata.address, metadata);
    }
}

#[async_trait]
impl TokenDataSource for InMemoryTokenSource {
    async fn token_metadata(&self, address: Address) -> anyhow::Result<Option<TokenMetadata>> {
        Ok(self.tokens.read().await.get(&address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const BOB: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    // ==================== InMemoryWalletSource tests ====================

    #[tokio::test]
    async fn test_subscribe_then_lookup() {
        let source = InMemoryWalletSource::new();
        source.subscribe_wallet("alice", ALICE, "tok-1").await.unwrap();

        let subs = source.subscribers_of(ALICE).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].wallet_name, "alice");
        assert_eq!(subs[0].device_token, "tok-1");
    }

    #[tokio::test]
    async fn test_lookup_unknown_address_is_empty() {
        let source = InMemoryWalletSource::new();
        assert!(source.subscribers_of(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_devices_share_an_address() {
        let source = InMemoryWalletSource::new();
        source.subscribe_wallet("alice", ALICE, "tok-1").await.unwrap();
        source.subscribe_wallet("alice", ALICE, "tok-2").await.unwrap();

        let subs = source.subscribers_of(ALICE).await.unwrap();
        assert_eq!(subs.len(), 2);
    }

    #[tokio::test]
    async fn test_one_device_tracks_multiple_addresses() {
        let source = InMemoryWalletSource::new();
        source.subscribe_wallet("alice", ALICE, "tok-1").await.unwrap();
        source.subscribe_wallet("savings", BOB, "tok-1").await.unwrap();

        assert_eq!(source.subscribers_of(ALICE).await.unwrap().len(), 1);
        assert_eq!(source.subscribers_of(BOB).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_is_ignored() {
        let source = InMemoryWalletSource::new();
        source.subscribe_wallet("alice", ALICE, "tok-1").await.unwrap();
        source.subscribe_wallet("alice", ALICE, "tok-1").await.unwrap();

        assert_eq!(source.subscribers_of(ALICE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_all_devices() {
        let source = InMemoryWalletSource::new();
        source.subscribe_wallet("alice", ALICE, "tok-1").await.unwrap();
        source.subscribe_wallet("alice", ALICE, "tok-2").await.unwrap();
        source.unsubscribe_wallet_all_device(ALICE).await.unwrap();

        assert!(source.subscribers_of(ALICE).await.unwrap().is_empty());
    }

    // ==================== InMemoryTokenSource tests ====================

    #[tokio::test]
    async fn test_token_metadata_hit() {
        let source = InMemoryTokenSource::new();
        source
            .insert(TokenMetadata {
                address: BOB,
                name: "Test Token".to_string(),
                symbol: "TST".to_string(),
                decimals: 18,
            })
            .await;

        let meta = source.token_metadata(BOB).await.unwrap().unwrap();
        assert_eq!(meta.symbol, "TST");
        assert_eq!(meta.decimals, 18);
    }

    #[tokio::test]
    async fn test_token_metadata_miss() {
        let source = InMemoryTokenSource::new();
        assert!(source.token_metadata(ALICE).await.unwrap().is_none());
    }
}
