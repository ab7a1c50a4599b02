//! JSON-RPC network handle for the registry contract
//!
//! Reads go through a plain provider, writes through a provider with the
//! recommended fillers and the issuer's wallet. Events are produced by
//! polling: each tick reads the chain head, then reports the new blocks and
//! any registry logs in the new range.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    contract::Error as ContractError,
    primitives::{Address, TxHash},
    network::{Ethereum, EthereumWallet},
    providers::{
        fillers::{FillProvider, JoinFill, RecommendedFillers, WalletFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::{
        client::RpcClient,
        types::{Filter, Log},
    },
    sol,
    transports::{http::Http, RpcError, TransportError},
};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, RegistryError, RegistryResult};
use crate::network::{EventSink, EventStream, RegistryNetwork};
use crate::types::{
    ContractEventData, EventPayload, EventSource, LogFilter, StatusOperation, StatusWrite,
};
use crate::wallet::Wallet;

// Registry contract interface
sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface VcStatusRegistry {
        event VcStatusSet(address indexed issuer, address indexed credentialId);
        event VcStatusRemoved(address indexed issuer, address indexed credentialId);

        function getVcStatus(address issuer, address credentialId) external view returns (bool);
        function setVcStatus(address credentialId) external;
        function removeVcStatus(address credentialId) external;
    }
}

type HttpTransport = Http<reqwest::Client>;
type WriteProvider = Arc<
    FillProvider<
        JoinFill<
            JoinFill<Identity, <Ethereum as RecommendedFillers>::RecommendedFillers>,
            WalletFiller<EthereumWallet>,
        >,
        RootProvider<HttpTransport>,
        HttpTransport,
        Ethereum,
    >,
>;

/// Most blocks covered by one round of `eth_getLogs` queries
const MAX_POLL_RANGE: u64 = 1000;

/// Tuning for [`JsonRpcNetwork`]
#[derive(Debug, Clone)]
pub struct JsonRpcOptions {
    /// How often the event poller checks for new blocks
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl JsonRpcOptions {
    const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
}

impl Default for JsonRpcOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// HTTP JSON-RPC implementation of [`RegistryNetwork`]
pub struct JsonRpcNetwork {
    endpoint: String,
    reader: RootProvider<HttpTransport>,
    writer: Option<WriteProvider>,
    signer_address: Option<Address>,
    poll_interval: Duration,
}

impl JsonRpcNetwork {
    /// Connect with default options. Without a wallet the handle is read-only.
    pub fn connect(endpoint: &str, wallet: Option<&Wallet>) -> RegistryResult<Self> {
        Self::connect_with_options(endpoint, wallet, JsonRpcOptions::default())
    }

    /// Connect with explicit timeouts and poll interval.
    ///
    /// No request is made here; an unreachable endpoint only shows up on the
    /// first call.
    pub fn connect_with_options(
        endpoint: &str,
        wallet: Option<&Wallet>,
        options: JsonRpcOptions,
    ) -> RegistryResult<Self> {
        let url: Url = endpoint
            .parse()
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(
                    error = %err,
                    "Failed to build RPC HTTP client with timeouts; falling back to defaults"
                );
                reqwest::Client::new()
            });

        let transport = Http::with_client(http_client.clone(), url.clone());
        let is_local = transport.guess_local();
        let reader = RootProvider::new(RpcClient::new(transport, is_local));

        let writer = wallet.map(|wallet| {
            let provider = ProviderBuilder::new()
                .with_recommended_fillers()
                .wallet(wallet.ethereum_wallet())
                .on_client(RpcClient::new(Http::with_client(http_client, url), is_local));
            Arc::new(provider) as WriteProvider
        });

        debug!(endpoint, read_only = writer.is_none(), "JSON-RPC network handle created");

        Ok(Self {
            endpoint: endpoint.to_string(),
            reader,
            writer,
            signer_address: wallet.map(Wallet::address),
            poll_interval: options.poll_interval,
        })
    }

    /// Address writes are signed with, if a wallet was given
    pub fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn rpc_error(&self, err: TransportError) -> NetworkError {
        map_transport_error(err, &self.endpoint, false)
    }

    fn contract_error(&self, err: ContractError) -> NetworkError {
        match err {
            ContractError::TransportError(err) => map_transport_error(err, &self.endpoint, true),
            other => NetworkError::Decode(other.to_string()),
        }
    }
}

#[async_trait]
impl RegistryNetwork for JsonRpcNetwork {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, NetworkError> {
        self.reader
            .get_transaction_count(address)
            .await
            .map_err(|e| self.rpc_error(e))
    }

    async fn get_block_number(&self) -> Result<u64, NetworkError> {
        self.reader
            .get_block_number()
            .await
            .map_err(|e| self.rpc_error(e))
    }

    async fn get_vc_status(
        &self,
        contract: Address,
        issuer: Address,
        credential_id: Address,
    ) -> Result<bool, NetworkError> {
        let registry = VcStatusRegistry::new(contract, &self.reader);
        let result = registry
            .getVcStatus(issuer, credential_id)
            .call()
            .await
            .map_err(|e| self.contract_error(e))?;

        Ok(result._0)
    }

    async fn send_status_write(
        &self,
        contract: Address,
        from: Address,
        write: StatusWrite,
    ) -> Result<TxHash, NetworkError> {
        let writer = match (&self.writer, self.signer_address) {
            (Some(writer), Some(signer)) if signer == from => writer,
            _ => {
                return Err(NetworkError::MissingSigner {
                    address: from.to_string(),
                })
            }
        };

        let registry = VcStatusRegistry::new(contract, writer);

        // The nonce is always ours; the filler only fills what is missing
        let pending = match write.operation {
            StatusOperation::Set => {
                registry
                    .setVcStatus(write.credential_id)
                    .from(from)
                    .nonce(write.nonce)
                    .send()
                    .await
            }
            StatusOperation::Remove => {
                registry
                    .removeVcStatus(write.credential_id)
                    .from(from)
                    .nonce(write.nonce)
                    .send()
                    .await
            }
        }
        .map_err(|e| self.contract_error(e))?;

        Ok(*pending.tx_hash())
    }

    async fn subscribe(&self, sources: Vec<EventSource>) -> Result<EventStream, NetworkError> {
        let (sink, stream) = mpsc::unbounded_channel();

        let mut poller = EventPoller {
            endpoint: self.endpoint.clone(),
            reader: self.reader.clone(),
            interval: self.poll_interval,
            forward_blocks: false,
            forward_errors: false,
            log_filters: Vec::new(),
        };
        for source in sources {
            match source {
                EventSource::Block => poller.forward_blocks = true,
                EventSource::Error => poller.forward_errors = true,
                EventSource::Logs(filter) => poller.log_filters.push(filter),
            }
        }

        info!(
            endpoint = %self.endpoint,
            interval_ms = self.poll_interval.as_millis() as u64,
            filters = poller.log_filters.len(),
            "Starting event poller"
        );
        tokio::spawn(poller.run(sink));

        Ok(stream)
    }
}

struct EventPoller {
    endpoint: String,
    reader: RootProvider<HttpTransport>,
    interval: Duration,
    forward_blocks: bool,
    forward_errors: bool,
    log_filters: Vec<LogFilter>,
}

impl EventPoller {
    async fn run(self, sink: EventSink) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut head = None;

        loop {
            ticker.tick().await;
            if sink.is_closed() {
                break;
            }

            if let Err(err) = self.poll(&mut head, &sink).await {
                warn!(endpoint = %self.endpoint, error = %err, "Event poll failed");
                if self.forward_errors {
                    let payload = json!({
                        "message": err.to_string(),
                        "code": err.error_code(),
                    });
                    let _ = sink.send((EventSource::Error, EventPayload::Error(payload)));
                }
            }
        }

        debug!(endpoint = %self.endpoint, "Event poller stopped");
    }

    async fn poll(&self, head: &mut Option<u64>, sink: &EventSink) -> Result<(), NetworkError> {
        let current = self
            .reader
            .get_block_number()
            .await
            .map_err(|e| map_transport_error(e, &self.endpoint, false))?;

        // First poll only records the head; nothing before it is replayed
        let Some(previous) = *head else {
            *head = Some(current);
            debug!(block_number = current, "Event poller anchored at chain head");
            return Ok(());
        };
        let Some(range) = poll_range(previous, current) else {
            return Ok(());
        };
        let (from, to) = (*range.start(), *range.end());

        // Fetch everything before emitting so a failed poll emits nothing
        let mut logs = Vec::new();
        for filter in &self.log_filters {
            let found = self
                .reader
                .get_logs(&rpc_filter(filter, from, to))
                .await
                .map_err(|e| map_transport_error(e, &self.endpoint, false))?;
            logs.push((filter, found));
        }

        if self.forward_blocks {
            for block_number in range {
                let _ = sink.send((EventSource::Block, EventPayload::BlockNumber(block_number)));
            }
        }
        for (filter, found) in logs {
            for log in found {
                let _ = sink.send((
                    EventSource::Logs(filter.clone()),
                    EventPayload::Log(log.into()),
                ));
            }
        }

        if to < current {
            debug!(head = to, chain_head = current, "Event poller catching up");
        }
        *head = Some(to);
        Ok(())
    }
}

/// Blocks to cover after `previous`, at most [`MAX_POLL_RANGE`] of them.
/// Anything past the cap is picked up by later polls.
fn poll_range(previous: u64, current: u64) -> Option<RangeInclusive<u64>> {
    if current <= previous {
        return None;
    }
    let from = previous + 1;
    Some(from..=current.min(previous.saturating_add(MAX_POLL_RANGE)))
}

fn rpc_filter(filter: &LogFilter, from: u64, to: u64) -> Filter {
    let rpc = Filter::new()
        .address(filter.address)
        .from_block(from)
        .to_block(to);

    match filter.topics.first() {
        Some(signature) => rpc.event_signature(*signature),
        None => rpc,
    }
}

/// Transport failures are connectivity problems; JSON-RPC error responses
/// to contract calls are the contract rejecting the call.
fn map_transport_error(err: TransportError, endpoint: &str, contract_call: bool) -> NetworkError {
    match err {
        RpcError::Transport(kind) => NetworkError::Connectivity {
            endpoint: endpoint.to_string(),
            message: kind.to_string(),
        },
        RpcError::ErrorResp(payload) if contract_call => {
            NetworkError::ContractCall(payload.to_string())
        }
        other => NetworkError::Rpc(other.to_string()),
    }
}

impl From<Log> for ContractEventData {
    fn from(log: Log) -> Self {
        Self {
            block_number: log.block_number,
            block_hash: log.block_hash,
            transaction_index: log.transaction_index,
            removed: log.removed,
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}
