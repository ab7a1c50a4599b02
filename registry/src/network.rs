//! The network handle the client is built on
//!
//! Connection, signing, broadcast and confirmation all live behind this
//! trait. [`JsonRpcNetwork`](crate::rpc::JsonRpcNetwork) is the JSON-RPC
//! implementation; tests plug in their own.

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::NetworkError;
use crate::types::{EventPayload, EventSource, StatusWrite};

/// Stream of `(source, payload)` pairs produced by [`RegistryNetwork::subscribe`]
pub type EventStream = mpsc::UnboundedReceiver<(EventSource, EventPayload)>;

/// Sending half handed to whoever produces network events
pub type EventSink = mpsc::UnboundedSender<(EventSource, EventPayload)>;

#[async_trait]
pub trait RegistryNetwork: Send + Sync + 'static {
    /// The endpoint this handle was built from, as given
    fn endpoint(&self) -> &str;

    /// Number of transactions `address` has sent, i.e. its next nonce
    async fn get_transaction_count(&self, address: Address) -> Result<u64, NetworkError>;

    async fn get_block_number(&self) -> Result<u64, NetworkError>;

    /// Call the registry's `getVcStatus(issuer, credentialId)` view
    async fn get_vc_status(
        &self,
        contract: Address,
        issuer: Address,
        credential_id: Address,
    ) -> Result<bool, NetworkError>;

    /// Sign and broadcast a registry write from `from`, returning its hash
    async fn send_status_write(
        &self,
        contract: Address,
        from: Address,
        write: StatusWrite,
    ) -> Result<TxHash, NetworkError>;

    /// Start delivering events for `sources`
    ///
    /// Only events matching one of the sources are delivered. The stream ends
    /// when the handle stops producing events.
    async fn subscribe(&self, sources: Vec<EventSource>) -> Result<EventStream, NetworkError>;
}
