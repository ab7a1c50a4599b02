//! Transaction sequence numbers (nonces) for one signing identity
//!
//! The first allocation fetches the identity's transaction count from the
//! network. Every caller that arrives while that fetch is in flight awaits the
//! same fetch, then takes the next value from a local counter, so concurrent
//! writes never share a nonce and only one round trip is made.

use std::sync::Arc;

use alloy::primitives::Address;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::NetworkError;
use crate::network::RegistryNetwork;

type SharedFetch = Shared<BoxFuture<'static, Result<u64, NetworkError>>>;

enum CounterState {
    /// Nothing fetched yet, or the last fetch failed
    Idle,
    /// A fetch is in flight; late callers clone and await it
    Fetching { generation: u64, fetch: SharedFetch },
    /// Armed: `next` is the value the next caller receives
    Ready { next: u64 },
}

struct Inner {
    state: CounterState,
    generation: u64,
}

/// Single-flight nonce counter scoped to one address
pub struct SequenceCounter<N> {
    network: Arc<N>,
    address: Address,
    inner: Mutex<Inner>,
}

impl<N: RegistryNetwork> SequenceCounter<N> {
    pub fn new(network: Arc<N>, address: Address) -> Self {
        Self {
            network,
            address,
            inner: Mutex::new(Inner {
                state: CounterState::Idle,
                generation: 0,
            }),
        }
    }

    /// Address this counter allocates for
    pub fn address(&self) -> Address {
        self.address
    }

    /// Allocate the next transaction sequence number.
    ///
    /// A failed fetch is returned to every caller that waited on it and
    /// leaves the counter unarmed; the next call fetches again.
    pub async fn transaction_count(&self) -> Result<u64, NetworkError> {
        let (generation, fetch) = {
            let mut inner = self.inner.lock().await;

            let in_flight = match &mut inner.state {
                CounterState::Ready { next } => {
                    let value = *next;
                    *next += 1;
                    debug!(address = %self.address, nonce = value, "Allocated sequence number");
                    return Ok(value);
                }
                CounterState::Fetching { generation, fetch } => Some((*generation, fetch.clone())),
                CounterState::Idle => None,
            };

            match in_flight {
                Some(pending) => pending,
                None => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let fetch = self.start_fetch();
                    inner.state = CounterState::Fetching {
                        generation,
                        fetch: fetch.clone(),
                    };
                    debug!(address = %self.address, "Fetching transaction count");
                    (generation, fetch)
                }
            }
        };

        let result = fetch.await;
        let mut inner = self.inner.lock().await;

        match result {
            Ok(base) => {
                if let CounterState::Ready { next } = &mut inner.state {
                    let value = *next;
                    *next += 1;
                    debug!(address = %self.address, nonce = value, "Allocated sequence number");
                    return Ok(value);
                }

                // First waiter to resume arms the counter
                inner.state = CounterState::Ready { next: base + 1 };
                debug!(address = %self.address, nonce = base, "Sequence counter armed");
                Ok(base)
            }
            Err(err) => {
                if matches!(
                    inner.state,
                    CounterState::Fetching { generation: current, .. } if current == generation
                ) {
                    inner.state = CounterState::Idle;
                }
                warn!(address = %self.address, error = %err, "Failed to fetch transaction count");
                Err(err)
            }
        }
    }

    /// Next value that would be handed out, if the counter is armed
    pub async fn peek(&self) -> Option<u64> {
        match self.inner.lock().await.state {
            CounterState::Ready { next } => Some(next),
            _ => None,
        }
    }

    fn start_fetch(&self) -> SharedFetch {
        let network = Arc::clone(&self.network);
        let address = self.address;
        async move { network.get_transaction_count(address).await }
            .boxed()
            .shared()
    }
}
