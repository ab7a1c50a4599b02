//! Client for the verifiable credential status registry contract

use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::events::{EventChannel, EventRouter};
use crate::network::RegistryNetwork;
use crate::rpc::{JsonRpcNetwork, JsonRpcOptions};
use crate::sequence::SequenceCounter;
use crate::types::{
    ContractEventData, NewBlockData, ProviderErrorData, StatusOperation, StatusWrite,
};
use crate::wallet::Wallet;

/// Client for one deployed registry, optionally holding an issuer identity
///
/// Without a wallet the client is read-only: status lookups and block
/// queries work, writes fail before touching the network.
pub struct RegistryClient<N: RegistryNetwork> {
    network: Arc<N>,
    ethereum_provider: String,
    contract_address: Address,
    wallet: Option<Wallet>,
    sequence: Option<SequenceCounter<N>>,
    events: EventRouter,
    listener: JoinHandle<()>,
}

impl RegistryClient<JsonRpcNetwork> {
    /// Connect to a JSON-RPC endpoint with default options
    pub async fn connect(
        ethereum_provider: &str,
        contract_address: &str,
        private_key: Option<&str>,
    ) -> RegistryResult<Self> {
        Self::connect_with_options(
            ethereum_provider,
            contract_address,
            private_key,
            JsonRpcOptions::default(),
        )
        .await
    }

    pub async fn connect_with_options(
        ethereum_provider: &str,
        contract_address: &str,
        private_key: Option<&str>,
        options: JsonRpcOptions,
    ) -> RegistryResult<Self> {
        let wallet = private_key.map(Wallet::from_private_key).transpose()?;
        let network = JsonRpcNetwork::connect_with_options(ethereum_provider, wallet.as_ref(), options)?;
        Self::new(network, contract_address, wallet).await
    }

    /// Connect using a loaded [`RegistryConfig`]
    pub async fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        Self::connect_with_options(
            &config.ethereum_provider_url,
            &config.contract_address,
            config.private_key.as_deref(),
            config.json_rpc_options(),
        )
        .await
    }
}

impl<N: RegistryNetwork> RegistryClient<N> {
    /// Build a client on an existing network handle and start routing its events
    pub async fn new(
        network: N,
        contract_address: &str,
        wallet: Option<Wallet>,
    ) -> RegistryResult<Self> {
        let contract_address: Address = contract_address
            .parse()
            .map_err(|_| RegistryError::InvalidAddress(contract_address.to_string()))?;

        let network = Arc::new(network);
        let sequence = wallet
            .as_ref()
            .map(|wallet| SequenceCounter::new(Arc::clone(&network), wallet.address()));

        let events = EventRouter::new(contract_address);
        let listener = events.attach(network.as_ref()).await?;

        info!(
            ethereum_provider = %network.endpoint(),
            contract = %contract_address,
            issuer = ?wallet.as_ref().map(Wallet::address),
            "Registry client ready"
        );

        Ok(Self {
            ethereum_provider: network.endpoint().to_string(),
            network,
            contract_address,
            wallet,
            sequence,
            events,
            listener,
        })
    }

    /// Whether `credential_id` is currently marked by `issuer`
    pub async fn get_vc_status(
        &self,
        issuer: Address,
        credential_id: Address,
    ) -> RegistryResult<bool> {
        let status = self
            .network
            .get_vc_status(self.contract_address, issuer, credential_id)
            .await?;

        debug!(
            issuer = %issuer,
            credential_id = %credential_id,
            status = status,
            "Fetched credential status"
        );

        Ok(status)
    }

    /// Mark `credential_id` in the registry under this client's issuer address
    pub async fn set_vc_status(&self, credential_id: Address) -> RegistryResult<TxHash> {
        self.submit(StatusOperation::Set, credential_id).await
    }

    /// Clear `credential_id` from the registry under this client's issuer address
    pub async fn remove_vc_status(&self, credential_id: Address) -> RegistryResult<TxHash> {
        self.submit(StatusOperation::Remove, credential_id).await
    }

    pub async fn get_block_number(&self) -> RegistryResult<u64> {
        Ok(self.network.get_block_number().await?)
    }

    async fn submit(
        &self,
        operation: StatusOperation,
        credential_id: Address,
    ) -> RegistryResult<TxHash> {
        let (wallet, sequence) = match (&self.wallet, &self.sequence) {
            (Some(wallet), Some(sequence)) => (wallet, sequence),
            _ => {
                return Err(RegistryError::MissingIdentity {
                    operation: operation.method_name(),
                })
            }
        };

        let nonce = sequence.transaction_count().await?;

        debug!(
            operation = operation.method_name(),
            credential_id = %credential_id,
            nonce = nonce,
            "Submitting status write"
        );

        let write = StatusWrite {
            operation,
            credential_id,
            nonce,
        };
        let tx_hash = self
            .network
            .send_status_write(self.contract_address, wallet.address(), write)
            .await?;

        info!(
            operation = operation.method_name(),
            credential_id = %credential_id,
            nonce = nonce,
            tx_hash = %tx_hash,
            "Status write broadcast"
        );

        Ok(tx_hash)
    }

    /// Issuer identity, if any
    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    /// The network handle
    pub fn provider(&self) -> &N {
        &self.network
    }

    /// The endpoint the network handle was built from, as given
    pub fn ethereum_provider(&self) -> &str {
        &self.ethereum_provider
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn is_read_only(&self) -> bool {
        self.wallet.is_none()
    }

    pub fn on_set_vc_status(&self) -> &EventChannel<ContractEventData> {
        self.events.on_set_vc_status()
    }

    pub fn on_remove_vc_status(&self) -> &EventChannel<ContractEventData> {
        self.events.on_remove_vc_status()
    }

    pub fn on_new_block(&self) -> &EventChannel<NewBlockData> {
        self.events.on_new_block()
    }

    pub fn on_error(&self) -> &EventChannel<ProviderErrorData> {
        self.events.on_error()
    }

    /// The router feeding the four event channels
    pub fn events(&self) -> &EventRouter {
        &self.events
    }
}

impl<N: RegistryNetwork> Drop for RegistryClient<N> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
