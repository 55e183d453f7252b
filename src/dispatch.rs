//! Dispatch Pipeline
//!
//! Turns a matched (transaction, subscriber) pair into a delivered or
//! suppressed push message. The hook order is fixed: MessageTitle,
//! MessagePayload, message construction, BeforeSend, AllowSend, transport
//! send, AfterSend — and only the AllowSend gate may cut it short.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::hooks::MessageHooks;
use crate::source::WalletSubscriber;
use crate::transaction::Transaction;

/// Sound identifier set on every push message
pub const DEFAULT_SOUND: &str = "default";

/// Badge count set on every push message
pub const DEFAULT_BADGE: &str = "1";

/// Errors that can occur while delivering a push message
#[derive(Error, Debug)]
pub enum SendError {
    #[error("push delivery failed: {0}")]
    Delivery(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The message handed to the push transport, one per (transaction, subscriber)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Notification title (the engine's configured push title)
    pub title: String,
    /// Sound identifier
    pub sound: String,
    /// Notification body, produced by the MessageTitle hook
    pub content: String,
    /// Badge count
    pub badge: String,
    /// Target device tokens
    pub device_tokens: Vec<String>,
    /// Arbitrary key-value payload, produced by the MessagePayload hook
    pub payload: HashMap<String, Value>,
}

impl PushMessage {
    /// Serialize the message to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a message from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Push delivery transport, e.g. an FCM-style HTTP client
///
/// The engine treats delivery failures as reportable and non-fatal: a failed
/// send is logged, the cache keeps its sent marker, and the remaining
/// subscribers of the same transaction are unaffected.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `message` using `push_key` as the provider credential
    async fn send(&self, push_key: &str, message: &PushMessage) -> Result<(), SendError>;
}

/// Default transport: records the delivery attempt in the log and drops it
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn send(&self, _push_key: &str, message: &PushMessage) -> Result<(), SendError> {
        info!(
            "push (log transport): '{}' -> {} device(s)",
            message.content,
            message.device_tokens.len()
        );
        Ok(())
    }
}

/// What the pipeline did with a claimed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message passed the gate and was handed to the transport
    Sent,
    /// The AllowSend gate vetoed the message; nothing was transported
    Suppressed,
}

/// Runs the fixed hook sequence for claimed (transaction, subscriber) pairs
#[derive(Debug, Clone)]
pub struct Dispatcher {
    push_key: String,
    push_title: String,
}

impl Dispatcher {
    /// Create a dispatcher with the engine's push credentials
    pub fn new(push_key: impl Into<String>, push_title: impl Into<String>) -> Self {
        Self {
            push_key: push_key.into(),
            push_title: push_title.into(),
        }
    }

    /// Build the push message for a pair (pipeline steps 1-3)
    pub fn build_message(
        &self,
        tx: &Transaction,
        subscriber: &WalletSubscriber,
        hooks: &MessageHooks,
    ) -> PushMessage {
        PushMessage {
            title: self.push_title.clone(),
            sound: DEFAULT_SOUND.to_string(),
            content: (hooks.message_title)(tx, subscriber),
            badge: DEFAULT_BADGE.to_string(),
            device_tokens: vec![subscriber.device_token.clone()],
            payload: (hooks.message_payload)(tx, subscriber),
        }
    }

    /// Run the full pipeline for one pair
    ///
    /// BeforeSend always runs; AfterSend runs only when the transport was
    /// invoked and succeeded. A transport failure surfaces as `Err` so the
    /// caller can report it without affecting other subscribers.
    pub async fn dispatch(
        &self,
        tx: &Transaction,
        subscriber: &WalletSubscriber,
        hooks: &MessageHooks,
        transport: &dyn PushTransport,
    ) -> Result<DispatchOutcome, SendError> {
        let message = self.build_message(tx, subscriber, hooks);

        (hooks.before_send)(tx, subscriber, &message);

        if !(hooks.allow_send)(tx, subscriber, &message) {
            debug!(
                "send suppressed by allow_send: tx {} device {}",
                tx.hash_hex(),
                subscriber.device_token
            );
            return Ok(DispatchOutcome::Suppressed);
        }

        transport.send(&self.push_key, &message).await?;
        (hooks.after_send)(tx, subscriber, &message);

        Ok(DispatchOutcome::Sent)
    }
}
