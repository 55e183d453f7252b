//! Chain Subscriber
//!
//! Owns the live subscription loop: attaches to the node's new-block stream
//! (and, optionally, the pending-transaction stream), turns every delivered
//! payload into a `Transaction`, matches it against the wallet registry, and
//! pushes the matched pairs through the cache gate into the dispatch
//! pipeline. Per-event failures are logged and skipped; only cancellation or
//! a closed stream ends the loop.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use alloy::providers::{Provider, RootProvider};
use alloy::pubsub::PubSubFrontend;
use alloy::rpc::types::{BlockTransactionsKind, Transaction as RpcTransaction};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::NotificationCache;
use crate::dispatch::{DispatchOutcome, Dispatcher, PushTransport};
use crate::hooks::MessageHooks;
use crate::source::{TokenDataSource, WalletDataSource, WalletSubscriber};
use crate::transaction::Transaction;

/// Errors raised while establishing the node subscriptions
#[derive(Error, Debug)]
pub enum SubscribeError {
    #[error("failed to subscribe to {0}: {1}")]
    Subscribe(&'static str, String),
}

/// Lifecycle of a chain subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Constructed, subscriptions not yet requested
    Idle,
    /// Subscription requests in flight
    Subscribing,
    /// Receiving and processing events
    Streaming,
    /// Terminal: cancelled by stop or the stream closed
    Cancelled,
}

/// The collaborators shared between the engine and the processing tasks
///
/// Swapped as a unit under the engine's lock; processing takes a clone per
/// event, so readers always see a consistent bundle.
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub wallet_source: Arc<dyn WalletDataSource>,
    pub token_source: Arc<dyn TokenDataSource>,
    pub cache: Arc<dyn NotificationCache>,
    pub transport: Arc<dyn PushTransport>,
    pub hooks: MessageHooks,
}

/// Per-event processing: decode, enrich, match, gate, dispatch
///
/// Holds no connection; the streaming tasks hand it fully delivered
/// transaction payloads.
pub(crate) struct EventProcessor {
    shared: Arc<RwLock<Collaborators>>,
    dispatcher: Dispatcher,
    chain_name: String,
}

impl EventProcessor {
    pub(crate) fn new(
        shared: Arc<RwLock<Collaborators>>,
        dispatcher: Dispatcher,
        chain_name: String,
    ) -> Self {
        Self {
            shared,
            dispatcher,
            chain_name,
        }
    }

    fn snapshot(&self) -> Collaborators {
        self.shared
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Process one raw transaction payload from either stream
    pub(crate) async fn process_rpc_transaction(&self, raw: &RpcTransaction, pending: bool) {
        let mut tx = Transaction::from_rpc(raw, &self.chain_name, pending);
        let collab = self.snapshot();

        if let Some(to) = tx.to {
            match collab.token_source.token_metadata(to).await {
                Ok(meta) => tx.token = meta,
                Err(err) => warn!("token lookup failed for {}: {:#}", to, err),
            }
        }

        let matched = self.match_subscribers(&tx, &collab).await;
        if matched.is_empty() {
            return;
        }
        debug!("tx {} matched {} subscriber(s)", tx.hash_hex(), matched.len());
        self.notify(&tx, &matched, &collab).await;
    }

    /// Union of subscribers across the candidate addresses, one per device
    pub(crate) async fn match_subscribers(
        &self,
        tx: &Transaction,
        collab: &Collaborators,
    ) -> Vec<WalletSubscriber> {
        let mut matched: Vec<WalletSubscriber> = Vec::new();
        for address in tx.candidate_addresses() {
            match collab.wallet_source.subscribers_of(address).await {
                Ok(subs) => {
                    for ws in subs {
                        // One record per device; the cache would gate the
                        // duplicates anyway, this just avoids the round trip.
                        if !matched.iter().any(|m| m.device_token == ws.device_token) {
                            matched.push(ws);
                        }
                    }
                }
                Err(err) => warn!("subscriber lookup failed for {}: {:#}", address, err),
            }
        }
        matched
    }

    /// Cache-gate each matched subscriber, then dispatch the fresh ones
    pub(crate) async fn notify(
        &self,
        tx: &Transaction,
        subscribers: &[WalletSubscriber],
        collab: &Collaborators,
    ) {
        let tx_hash = tx.hash_hex();
        for ws in subscribers {
            let claimed = match collab.cache.claim(&tx_hash, &ws.device_token).await {
                Ok(claimed) => claimed,
                Err(err) => {
                    warn!(
                        "cache claim failed for tx {} device {}: {:#}",
                        tx_hash, ws.device_token, err
                    );
                    continue;
                }
            };
            if !claimed {
                debug!("tx {} already notified to device {}", tx_hash, ws.device_token);
                continue;
            }

            match self
                .dispatcher
                .dispatch(tx, ws, &collab.hooks, collab.transport.as_ref())
                .await
            {
                Ok(DispatchOutcome::Sent) => {
                    debug!("notified device {} about tx {}", ws.device_token, tx_hash)
                }
                Ok(DispatchOutcome::Suppressed) => {}
                Err(err) => error!(
                    "push delivery failed for tx {} device {}: {}",
                    tx_hash, ws.device_token, err
                ),
            }
        }
    }
}

/// Fetch a block's full transaction list over the lookup connection
async fn fetch_block_transactions(
    lookup: &RootProvider<PubSubFrontend>,
    number: u64,
) -> Option<Vec<RpcTransaction>> {
    let block = match lookup
        .get_block_by_number(number.into(), BlockTransactionsKind::Full.into())
        .await
    {
        Ok(Some(block)) => block,
        Ok(None) => {
            warn!("block {} not available from lookup connection", number);
            return None;
        }
        Err(err) => {
            warn!("failed to fetch block {}: {}", number, err);
            return None;
        }
    };

    match block.transactions.as_transactions() {
        Some(txs) => Some(txs.to_vec()),
        None => {
            warn!("block {} delivered without full transactions", number);
            None
        }
    }
}

/// A not-yet-started subscriber bound to the engine's connections
pub(crate) struct ChainSubscriber {
    events: RootProvider<PubSubFrontend>,
    lookup: RootProvider<PubSubFrontend>,
    processor: Arc<EventProcessor>,
    pending_enabled: bool,
}

impl ChainSubscriber {
    pub(crate) fn new(
        events: RootProvider<PubSubFrontend>,
        lookup: RootProvider<PubSubFrontend>,
        processor: EventProcessor,
        pending_enabled: bool,
    ) -> Self {
        Self {
            events,
            lookup,
            processor: Arc::new(processor),
            pending_enabled,
        }
    }

    /// Establish the subscriptions and spawn the streaming tasks
    ///
    /// Returns once the node has acknowledged the subscriptions, so a failure
    /// here leaves nothing half-subscribed: either all tasks run or none.
    pub(crate) async fn start(self) -> Result<SubscriberHandle, SubscribeError> {
        let state = Arc::new(RwLock::new(SubscriberState::Subscribing));
        let cancel = CancellationToken::new();

        let blocks = self
            .events
            .subscribe_blocks()
            .await
            .map_err(|e| SubscribeError::Subscribe("newHeads", e.to_string()))?;

        let pending = if self.pending_enabled {
            Some(
                self.events
                    .subscribe_full_pending_transactions()
                    .await
                    .map_err(|e| {
                        SubscribeError::Subscribe("newPendingTransactions", e.to_string())
                    })?,
            )
        } else {
            None
        };

        set_state(&state, SubscriberState::Streaming);
        info!(
            "subscribed to new blocks{}",
            if pending.is_some() {
                " and pending transactions"
            } else {
                ""
            }
        );

        let mut tasks = Vec::new();

        {
            let processor = Arc::clone(&self.processor);
            let lookup = self.lookup.clone();
            let cancel = cancel.clone();
            let state = Arc::clone(&state);
            tasks.push(tokio::spawn(async move {
                let mut stream = blocks.into_stream();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("block stream cancelled");
                            break;
                        }
                        maybe_block = stream.next() => {
                            match maybe_block {
                                Some(block) => {
                                    let number = block.header.number;
                                    if let Some(txs) = fetch_block_transactions(&lookup, number).await {
                                        debug!("block {}: {} transaction(s)", number, txs.len());
                                        for raw in &txs {
                                            processor.process_rpc_transaction(raw, false).await;
                                        }
                                    }
                                }
                                None => {
                                    error!("block subscription closed by node");
                                    set_state(&state, SubscriberState::Cancelled);
                                    break;
                                }
                            }
                        }
                    }
                }
            }));
        }

        if let Some(pending) = pending {
            let processor = Arc::clone(&self.processor);
            let cancel = cancel.clone();
            let state = Arc::clone(&state);
            tasks.push(tokio::spawn(async move {
                let mut stream = pending.into_stream();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("pending stream cancelled");
                            break;
                        }
                        maybe_tx = stream.next() => {
                            match maybe_tx {
                                Some(raw) => processor.process_rpc_transaction(&raw, true).await,
                                None => {
                                    error!("pending-transaction subscription closed by node");
                                    set_state(&state, SubscriberState::Cancelled);
                                    break;
                                }
                            }
                        }
                    }
                }
            }));
        }

        Ok(SubscriberHandle {
            cancel,
            tasks,
            state,
        })
    }
}

/// Handle to the running streaming tasks, owned by the engine between
/// start and stop
pub(crate) struct SubscriberHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    state: Arc<RwLock<SubscriberState>>,
}

impl SubscriberHandle {
    pub(crate) fn state(&self) -> SubscriberState {
        *self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel the subscriptions and drain the tasks
    ///
    /// In-flight dispatches get `drain` to complete; a task that overruns is
    /// detached rather than awaited forever.
    pub(crate) async fn shutdown(mut self, drain: Duration) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            match tokio::time::timeout(drain, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("subscriber task ended abnormally: {}", err),
                Err(_) => warn!("subscriber task did not drain within {:?}; detaching", drain),
            }
        }
        set_state(&self.state, SubscriberState::Cancelled);
    }
}

fn set_state(state: &Arc<RwLock<SubscriberState>>, next: SubscriberState) {
    *state
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}
