//! Types shared between the client, the event router and network handles

use alloy::primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Event emitted by the registry when an issuer marks a credential
pub const VC_STATUS_SET_EVENT: &str = "VcStatusSet(address,address)";

/// Event emitted by the registry when an issuer clears a credential
pub const VC_STATUS_REMOVED_EVENT: &str = "VcStatusRemoved(address,address)";

/// The two registry entry points that change state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusOperation {
    Set,
    Remove,
}

impl StatusOperation {
    /// Contract method name, also used in error messages
    pub fn method_name(&self) -> &'static str {
        match self {
            StatusOperation::Set => "setVcStatus",
            StatusOperation::Remove => "removeVcStatus",
        }
    }

    /// Canonical signature of the event this operation emits
    pub fn event_signature(&self) -> &'static str {
        match self {
            StatusOperation::Set => VC_STATUS_SET_EVENT,
            StatusOperation::Remove => VC_STATUS_REMOVED_EVENT,
        }
    }

    /// Topic hash of the emitted event
    pub fn event_topic(&self) -> B256 {
        keccak256(self.event_signature())
    }
}

/// A signed contract write, ready for submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWrite {
    pub operation: StatusOperation,
    pub credential_id: Address,
    /// Transaction sequence number (nonce) to submit with
    pub nonce: u64,
}

/// Raw log record as delivered by the network, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEventData {
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub transaction_index: Option<u64>,
    pub removed: bool,
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

/// Notification for a newly mined block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockData {
    pub block_number: u64,
}

/// Error payload forwarded as-is from the network handle
pub type ProviderErrorData = serde_json::Value;

/// Log filter: contract address plus the topics a log must carry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<B256>,
}

impl LogFilter {
    /// Filter for one event signature emitted by `address`
    pub fn for_event(address: Address, signature: &str) -> Self {
        Self {
            address,
            topics: vec![keccak256(signature)],
        }
    }
}

/// What a network event subscription is keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventSource {
    Block,
    Error,
    Logs(LogFilter),
}

/// Payload delivered alongside an [`EventSource`]
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    BlockNumber(u64),
    Log(ContractEventData),
    Error(ProviderErrorData),
}
