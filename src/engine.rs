//! Engine
//!
//! Composition root of the notification pipeline. Owns the node connections
//! and the chain subscriber, holds the pluggable collaborators behind a
//! shared lock, and exposes lifecycle, wallet subscription management, and
//! hook registration.

use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

use alloy::primitives::Address;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{InMemoryCache, NotificationCache};
use crate::connection::{ConnectionError, NodeConnection};
use crate::dispatch::{Dispatcher, LogTransport, PushMessage, PushTransport};
use crate::hooks::MessageHooks;
use crate::source::{
    InMemoryTokenSource, InMemoryWalletSource, TokenDataSource, WalletDataSource, WalletSubscriber,
};
use crate::subscriber::{
    ChainSubscriber, Collaborators, EventProcessor, SubscribeError, SubscriberHandle,
    SubscriberState,
};
use crate::transaction::Transaction;

/// Chain name applied when the config leaves it blank
pub const DEFAULT_CHAIN_NAME: &str = "mainnet";

/// How long stop waits for in-flight event processing before detaching
const STOP_DRAIN: Duration = Duration::from_secs(5);

/// Errors surfaced by engine construction and lifecycle operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,
}

/// Immutable construction-time configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// WebSocket endpoint of the node (required, non-blank)
    pub ws_url: String,
    /// Credential handed to the push transport on every send
    pub push_key: String,
    /// Title set on every push message
    pub push_title: String,
    /// Chain name stamped onto observed transactions; blank means "mainnet"
    pub chain_name: String,
    /// Also subscribe to pending (mempool) transactions
    pub enable_pending_tx: bool,
}

impl EngineConfig {
    /// Config for `ws_url` with everything else at its default
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    /// The chain name with the blank default applied
    pub fn resolved_chain_name(&self) -> String {
        if self.chain_name.trim().is_empty() {
            DEFAULT_CHAIN_NAME.to_string()
        } else {
            self.chain_name.clone()
        }
    }
}

/// The notification engine
///
/// Construct with [`Engine::new`], customize collaborators and hooks, then
/// [`Engine::start`]. All setters take effect for subsequent events; they are
/// safe to call while the subscriber is streaming.
pub struct Engine {
    connection: NodeConnection,
    shared: Arc<RwLock<Collaborators>>,
    subscriber: Option<SubscriberHandle>,
    chain_name: String,
    push_key: String,
    push_title: String,
    pending_enabled: bool,
}

impl Engine {
    /// Validate the config, open both node connections, and install the
    /// default collaborators and hooks
    pub async fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let connection = NodeConnection::connect(&config.ws_url).await?;
        let chain_name = config.resolved_chain_name();

        let shared = Arc::new(RwLock::new(Collaborators {
            wallet_source: Arc::new(InMemoryWalletSource::new()),
            token_source: Arc::new(InMemoryTokenSource::new()),
            cache: Arc::new(InMemoryCache::new()),
            transport: Arc::new(LogTransport),
            hooks: MessageHooks::new(),
        }));

        info!("engine ready (chain {})", chain_name);
        Ok(Self {
            connection,
            shared,
            subscriber: None,
            chain_name,
            push_key: config.push_key,
            push_title: config.push_title,
            pending_enabled: config.enable_pending_tx,
        })
    }

    /// The chain name stamped onto observed transactions
    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    /// True between a successful start and the matching stop
    pub fn is_running(&self) -> bool {
        self.subscriber.is_some()
    }

    /// State of the active subscriber, if any
    pub fn subscriber_state(&self) -> Option<SubscriberState> {
        self.subscriber.as_ref().map(|handle| handle.state())
    }

    /// Build and start the chain subscriber
    ///
    /// Returns once the node has acknowledged the subscriptions; event
    /// processing continues on background tasks. Starting twice without an
    /// intervening stop is rejected.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        if self.subscriber.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        info!("engine start");

        let processor = EventProcessor::new(
            Arc::clone(&self.shared),
            Dispatcher::new(self.push_key.clone(), self.push_title.clone()),
            self.chain_name.clone(),
        );
        let subscriber = ChainSubscriber::new(
            self.connection.events(),
            self.connection.lookup(),
            processor,
            self.pending_enabled,
        );
        self.subscriber = Some(subscriber.start().await?);
        Ok(())
    }

    /// Cancel the subscriptions and release the subscriber
    ///
    /// In-flight dispatches get a bounded drain window; stop never waits
    /// indefinitely.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        let handle = self.subscriber.take().ok_or(EngineError::NotRunning)?;
        handle.shutdown(STOP_DRAIN).await;
        info!("engine stopped");
        Ok(())
    }

    fn shared_write(&self) -> RwLockWriteGuard<'_, Collaborators> {
        self.shared
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the wallet registry
    pub fn set_data_source(&self, source: Arc<dyn WalletDataSource>) {
        self.shared_write().wallet_source = source;
    }

    /// Replace the token metadata lookup
    pub fn set_token_data_source(&self, source: Arc<dyn TokenDataSource>) {
        self.shared_write().token_source = source;
    }

    /// Replace the notification cache
    pub fn set_engine_cache(&self, cache: Arc<dyn NotificationCache>) {
        self.shared_write().cache = cache;
    }

    /// Replace the push transport
    pub fn set_transport(&self, transport: Arc<dyn PushTransport>) {
        self.shared_write().transport = transport;
    }

    /// Register a device's interest in an address
    ///
    /// Fire-and-forget: the call is delegated to the wallet data source on a
    /// background task and the result is not observed. A registration racing
    /// a matching transaction may or may not be seen by it.
    pub fn subscribe_wallet(&self, wallet_name: &str, address: Address, device_token: &str) {
        let source = self.wallet_source();
        let wallet_name = wallet_name.to_string();
        let device_token = device_token.to_string();
        tokio::spawn(async move {
            if let Err(err) = source
                .subscribe_wallet(&wallet_name, address, &device_token)
                .await
            {
                warn!("wallet subscribe failed for {}: {:#}", address, err);
            }
        });
    }

    /// Remove every device subscription for an address (fire-and-forget)
    pub fn unsubscribe_wallet(&self, address: Address) {
        let source = self.wallet_source();
        tokio::spawn(async move {
            if let Err(err) = source.unsubscribe_wallet_all_device(address).await {
                warn!("wallet unsubscribe failed for {}: {:#}", address, err);
            }
        });
    }

    fn wallet_source(&self) -> Arc<dyn WalletDataSource> {
        self.shared
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .wallet_source
            .clone()
    }

    /// Install the BeforeSend hook
    pub fn on_before_send<F>(&self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber, &PushMessage) + Send + Sync + 'static,
    {
        self.shared_write().hooks.set_before_send(hook);
    }

    /// Install the AfterSend hook
    pub fn on_after_send<F>(&self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber, &PushMessage) + Send + Sync + 'static,
    {
        self.shared_write().hooks.set_after_send(hook);
    }

    /// Install the message body builder
    pub fn set_message_title<F>(&self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber) -> String + Send + Sync + 'static,
    {
        self.shared_write().hooks.set_message_title(hook);
    }

    /// Install the payload builder
    pub fn set_message_payload<F>(&self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber) -> std::collections::HashMap<String, serde_json::Value>
            + Send
            + Sync
            + 'static,
    {
        self.shared_write().hooks.set_message_payload(hook);
    }

    /// Install the send gate
    pub fn set_allow_send<F>(&self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber, &PushMessage) -> bool + Send + Sync + 'static,
    {
        self.shared_write().hooks.set_allow_send(hook);
    }
}
