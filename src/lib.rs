//! ethpush — Wallet Push-Notification Engine
//!
//! Watches an Ethereum node's live transaction stream over persistent
//! WebSocket subscriptions, matches observed transactions against registered
//! wallet addresses, and delivers push notifications to the interested
//! devices — at most once per (transaction, device) pair.
//!
//! The engine owns the chain plumbing; applications plug in their own wallet
//! registry ([`WalletDataSource`]), token lookup ([`TokenDataSource`]),
//! dedup cache ([`NotificationCache`]), push transport ([`PushTransport`]),
//! and message hooks. Every seam ships with a working in-memory default.
//!
//! ```rust,ignore
//! use ethpush::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig {
//!     ws_url: "ws://127.0.0.1:8545".into(),
//!     push_key: "fcm-server-key".into(),
//!     push_title: "Wallet Alert".into(),
//!     ..Default::default()
//! })
//! .await?;
//!
//! engine.set_message_title(|tx, ws| {
//!     format!("{} received {} wei on {}", ws.wallet_name, tx.value, tx.chain_name)
//! });
//!
//! engine.subscribe_wallet("alice", address, "device-token");
//! engine.start().await?;
//! ```

pub mod cache;
pub mod connection;
pub mod dispatch;
pub mod engine;
pub mod hooks;
pub mod source;
mod subscriber;
pub mod transaction;

// Re-export commonly used types
pub use cache::{InMemoryCache, NotificationCache};
pub use connection::ConnectionError;
pub use dispatch::{
    DispatchOutcome, Dispatcher, LogTransport, PushMessage, PushTransport, SendError,
};
pub use engine::{Engine, EngineConfig, EngineError, DEFAULT_CHAIN_NAME};
pub use hooks::MessageHooks;
pub use source::{
    InMemoryTokenSource, InMemoryWalletSource, TokenDataSource, WalletDataSource, WalletSubscriber,
};
pub use subscriber::{SubscribeError, SubscriberState};
pub use transaction::{TokenMetadata, Transaction};
