//! Message Hooks
//!
//! Five customization points invoked per (transaction, subscriber) pair by
//! the dispatch pipeline. Every slot always holds a callable value; the
//! defaults are neutral, so callers override only the slots they care about.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::PushMessage;
use crate::source::WalletSubscriber;
use crate::transaction::Transaction;

/// Produces the push message body for a (transaction, subscriber) pair
pub type TitleHook = Arc<dyn Fn(&Transaction, &WalletSubscriber) -> String + Send + Sync>;

/// Produces the arbitrary key-value payload attached to a push message
pub type PayloadHook =
    Arc<dyn Fn(&Transaction, &WalletSubscriber) -> HashMap<String, Value> + Send + Sync>;

/// Side-effecting observer invoked around the transport send
pub type SendObserverHook =
    Arc<dyn Fn(&Transaction, &WalletSubscriber, &PushMessage) + Send + Sync>;

/// Gate deciding whether a built message is actually sent
pub type AllowSendHook =
    Arc<dyn Fn(&Transaction, &WalletSubscriber, &PushMessage) -> bool + Send + Sync>;

/// The hook bundle consulted by the dispatch pipeline
///
/// Cloning is cheap (the slots are shared function values); the pipeline
/// clones the bundle out of the engine's shared state per event, so a
/// mid-stream setter call swaps all slots consistently for later events.
#[derive(Clone)]
pub struct MessageHooks {
    pub(crate) before_send: SendObserverHook,
    pub(crate) after_send: SendObserverHook,
    pub(crate) message_title: TitleHook,
    pub(crate) message_payload: PayloadHook,
    pub(crate) allow_send: AllowSendHook,
}

impl Default for MessageHooks {
    fn default() -> Self {
        Self {
            before_send: Arc::new(|_, _, _| {}),
            after_send: Arc::new(|_, _, _| {}),
            message_title: Arc::new(|_, _| String::new()),
            message_payload: Arc::new(|_, _| HashMap::new()),
            allow_send: Arc::new(|_, _, _| true),
        }
    }
}

impl MessageHooks {
    /// Bundle with all five slots at their neutral defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the BeforeSend observer
    pub fn set_before_send<F>(&mut self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber, &PushMessage) + Send + Sync + 'static,
    {
        self.before_send = Arc::new(hook);
    }

    /// Replace the AfterSend observer
    pub fn set_after_send<F>(&mut self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber, &PushMessage) + Send + Sync + 'static,
    {
        self.after_send = Arc::new(hook);
    }

    /// Replace the message body builder
    pub fn set_message_title<F>(&mut self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber) -> String + Send + Sync + 'static,
    {
        self.message_title = Arc::new(hook);
    }

    /// Replace the payload builder
    pub fn set_message_payload<F>(&mut self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber) -> HashMap<String, Value> + Send + Sync + 'static,
    {
        self.message_payload = Arc::new(hook);
    }

    /// Replace the send gate
    pub fn set_allow_send<F>(&mut self, hook: F)
    where
        F: Fn(&Transaction, &WalletSubscriber, &PushMessage) -> bool + Send + Sync + 'static,
    {
        self.allow_send = Arc::new(hook);
    }
}

impl fmt::Debug for MessageHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageHooks { .. }")
    }
}
