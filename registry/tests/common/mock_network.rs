//! In-memory network handle for client tests
//!
//! Keeps credential statuses in a map, records every write, and lets tests
//! emit events the way a real provider would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{keccak256, Address, TxHash};
use async_trait::async_trait;
use tokio::sync::mpsc;

use vc_status_registry::network::{EventSink, EventStream};
use vc_status_registry::{
    EventPayload, EventSource, NetworkError, RegistryNetwork, StatusOperation, StatusWrite,
};

pub const ENDPOINT: &str = "https://rinkeby.infura.io";

/// Write recorded by [`MockNetwork`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub contract: Address,
    pub from: Address,
    pub write: StatusWrite,
}

pub struct MockNetwork {
    endpoint: String,
    unreachable: bool,
    transaction_count: u64,
    count_delay: Duration,
    count_failures: AtomicUsize,
    count_calls: AtomicUsize,
    block_number: AtomicU64,
    statuses: Mutex<HashMap<(Address, Address), bool>>,
    writes: Mutex<Vec<RecordedWrite>>,
    sources: Mutex<Vec<EventSource>>,
    sink: Mutex<Option<EventSink>>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            endpoint: ENDPOINT.to_string(),
            unreachable: false,
            transaction_count: 0,
            count_delay: Duration::ZERO,
            count_failures: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            block_number: AtomicU64::new(0),
            statuses: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
        }
    }

    /// Every request fails as if the host did not resolve
    pub fn unreachable(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            unreachable: true,
            ..Self::new()
        }
    }

    /// Transaction count reported for every address
    pub fn with_transaction_count(mut self, count: u64) -> Self {
        self.transaction_count = count;
        self
    }

    /// Delay before the transaction count query resolves
    pub fn with_count_delay(mut self, delay: Duration) -> Self {
        self.count_delay = delay;
        self
    }

    /// Fail the next `failures` transaction count queries
    pub fn failing_count_fetches(self, failures: usize) -> Self {
        self.count_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.block_number.store(block_number, Ordering::SeqCst);
        self
    }

    pub fn set_status(&self, issuer: Address, credential_id: Address, status: bool) {
        self.statuses
            .lock()
            .unwrap()
            .insert((issuer, credential_id), status);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn subscribed_sources(&self) -> Vec<EventSource> {
        self.sources.lock().unwrap().clone()
    }

    /// Deliver an event if something subscribed to its source
    pub fn emit(&self, source: EventSource, payload: EventPayload) -> bool {
        if !self.sources.lock().unwrap().contains(&source) {
            return false;
        }
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send((source, payload)).is_ok(),
            None => false,
        }
    }

    fn check_reachable(&self) -> Result<(), NetworkError> {
        if self.unreachable {
            return Err(NetworkError::Connectivity {
                endpoint: self.endpoint.clone(),
                message: "dns error: failed to lookup address information".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryNetwork for MockNetwork {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, NetworkError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        tokio::time::sleep(self.count_delay).await;

        let failing = self
            .count_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NetworkError::Rpc("transaction count unavailable".to_string()));
        }
        Ok(self.transaction_count)
    }

    async fn get_block_number(&self) -> Result<u64, NetworkError> {
        self.check_reachable()?;
        Ok(self.block_number.load(Ordering::SeqCst))
    }

    async fn get_vc_status(
        &self,
        _contract: Address,
        issuer: Address,
        credential_id: Address,
    ) -> Result<bool, NetworkError> {
        self.check_reachable()?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(&(issuer, credential_id))
            .copied()
            .unwrap_or(false))
    }

    async fn send_status_write(
        &self,
        contract: Address,
        from: Address,
        write: StatusWrite,
    ) -> Result<TxHash, NetworkError> {
        self.check_reachable()?;
        tokio::task::yield_now().await;

        let status = matches!(write.operation, StatusOperation::Set);
        self.set_status(from, write.credential_id, status);
        self.writes.lock().unwrap().push(RecordedWrite {
            contract,
            from,
            write,
        });

        Ok(keccak256(format!("{}:{}", from, write.nonce)))
    }

    async fn subscribe(&self, sources: Vec<EventSource>) -> Result<EventStream, NetworkError> {
        let (sink, stream) = mpsc::unbounded_channel();
        self.sources.lock().unwrap().extend(sources);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(stream)
    }
}
