//! Typed event channels fed from the network handle's raw event stream
//!
//! The router subscribes to new blocks, provider errors and the registry's
//! two status logs, then republishes each to its own [`EventChannel`].
//! Nothing is buffered: a subscriber only sees events published after it
//! attached.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use alloy::primitives::Address;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::NetworkError;
use crate::network::RegistryNetwork;
use crate::types::{
    ContractEventData, EventPayload, EventSource, LogFilter, NewBlockData, ProviderErrorData,
    VC_STATUS_REMOVED_EVENT, VC_STATUS_SET_EVENT,
};

type Handler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

struct ChannelInner<T> {
    name: &'static str,
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler<T>)>>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<T: 'static> Detach for ChannelInner<T> {
    fn detach(&self, id: u64) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        before != handlers.len()
    }
}

/// Handle returned by [`EventChannel::subscribe`]
///
/// Dropping the handle leaves the handler attached; call
/// [`unsubscribe`](Subscription::unsubscribe) to detach it.
pub struct Subscription {
    id: u64,
    channel: &'static str,
    target: Weak<dyn Detach>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the channel this subscription belongs to
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Detach the handler. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.target.upgrade() {
            Some(target) => target.detach(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Multi-subscriber broadcast point
///
/// Each published event is handed to every current subscriber in its own
/// tokio task. A handler that panics is logged and stays subscribed; the
/// other handlers are unaffected.
pub struct EventChannel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                name,
                next_id: AtomicU64::new(1),
                handlers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Attach an async handler
    pub fn subscribe<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.attach(Arc::new(move |event: T| handler(event).boxed()))
    }

    /// Attach a plain closure
    pub fn subscribe_sync<F>(&self, handler: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.attach(Arc::new(move |event: T| {
            let handler = Arc::clone(&handler);
            async move { handler(event) }.boxed()
        }))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Deliver `event` to every current subscriber. Returns how many were notified.
    ///
    /// Must be called from within a tokio runtime.
    pub fn publish(&self, event: T) -> usize {
        let handlers = self.inner.handlers.read().clone();
        let channel = self.inner.name;

        for (id, handler) in &handlers {
            let id = *id;
            let handler = Arc::clone(handler);
            let event = event.clone();

            tokio::spawn(async move {
                let delivery = AssertUnwindSafe(async move { handler(event).await });
                if delivery.catch_unwind().await.is_err() {
                    warn!(channel, subscriber = id, "Event handler panicked");
                }
            });
        }

        handlers.len()
    }

    fn attach(&self, handler: Handler<T>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.write().push((id, handler));
        debug!(channel = self.inner.name, subscriber = id, "Subscriber attached");

        let target: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            id,
            channel: self.inner.name,
            target: Arc::downgrade(&target),
        }
    }
}

/// Routes raw network events to the four typed channels
#[derive(Clone)]
pub struct EventRouter {
    contract_address: Address,
    set_filter: LogFilter,
    removed_filter: LogFilter,
    on_set_vc_status: EventChannel<ContractEventData>,
    on_remove_vc_status: EventChannel<ContractEventData>,
    on_new_block: EventChannel<NewBlockData>,
    on_error: EventChannel<ProviderErrorData>,
}

impl EventRouter {
    pub fn new(contract_address: Address) -> Self {
        Self {
            contract_address,
            set_filter: LogFilter::for_event(contract_address, VC_STATUS_SET_EVENT),
            removed_filter: LogFilter::for_event(contract_address, VC_STATUS_REMOVED_EVENT),
            on_set_vc_status: EventChannel::new("setVcStatus"),
            on_remove_vc_status: EventChannel::new("removeVcStatus"),
            on_new_block: EventChannel::new("newBlock"),
            on_error: EventChannel::new("error"),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Filter for `VcStatusSet` logs from the registry
    pub fn status_set_filter(&self) -> &LogFilter {
        &self.set_filter
    }

    /// Filter for `VcStatusRemoved` logs from the registry
    pub fn status_removed_filter(&self) -> &LogFilter {
        &self.removed_filter
    }

    /// Everything the router asks the network handle for
    pub fn sources(&self) -> Vec<EventSource> {
        vec![
            EventSource::Block,
            EventSource::Error,
            EventSource::Logs(self.set_filter.clone()),
            EventSource::Logs(self.removed_filter.clone()),
        ]
    }

    pub fn on_set_vc_status(&self) -> &EventChannel<ContractEventData> {
        &self.on_set_vc_status
    }

    pub fn on_remove_vc_status(&self) -> &EventChannel<ContractEventData> {
        &self.on_remove_vc_status
    }

    pub fn on_new_block(&self) -> &EventChannel<NewBlockData> {
        &self.on_new_block
    }

    pub fn on_error(&self) -> &EventChannel<ProviderErrorData> {
        &self.on_error
    }

    /// Republish one raw event. Returns how many subscribers were notified.
    pub fn dispatch(&self, source: EventSource, payload: EventPayload) -> usize {
        match (source, payload) {
            (EventSource::Block, EventPayload::BlockNumber(block_number)) => {
                self.on_new_block.publish(NewBlockData { block_number })
            }
            (EventSource::Error, EventPayload::Error(error)) => self.on_error.publish(error),
            (EventSource::Logs(filter), EventPayload::Log(log)) if filter == self.set_filter => {
                self.on_set_vc_status.publish(log)
            }
            (EventSource::Logs(filter), EventPayload::Log(log)) if filter == self.removed_filter => {
                self.on_remove_vc_status.publish(log)
            }
            (source, payload) => {
                debug!(?source, ?payload, "Dropping unroutable network event");
                0
            }
        }
    }

    /// Subscribe to `network` and spawn the dispatch loop
    ///
    /// The loop runs until the network's event stream closes or the returned
    /// handle is aborted.
    pub async fn attach<N: RegistryNetwork>(
        &self,
        network: &N,
    ) -> Result<JoinHandle<()>, NetworkError> {
        let mut events = network.subscribe(self.sources()).await?;
        let router = self.clone();

        Ok(tokio::spawn(async move {
            while let Some((source, payload)) = events.recv().await {
                router.dispatch(source, payload);
            }
            debug!(contract = %router.contract_address, "Network event stream closed");
        }))
    }
}
