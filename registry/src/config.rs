//! Configuration for the registry client

use std::time::Duration;

use serde::Deserialize;

use crate::rpc::JsonRpcOptions;

/// Registry client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Ethereum JSON-RPC endpoint
    #[serde(default = "default_ethereum_provider")]
    pub ethereum_provider_url: String,

    /// Status registry contract address
    pub contract_address: String,

    /// Issuer private key; absent means read-only
    #[serde(default)]
    pub private_key: Option<String>,

    /// Event polling interval in milliseconds
    #[serde(default = "default_event_poll_interval_ms")]
    pub event_poll_interval_ms: u64,

    /// RPC request timeout in seconds
    #[serde(default = "default_rpc_request_timeout_secs")]
    pub rpc_request_timeout_secs: u64,

    /// RPC connect timeout in seconds
    #[serde(default = "default_rpc_connect_timeout_secs")]
    pub rpc_connect_timeout_secs: u64,
}

fn default_ethereum_provider() -> String {
    "http://localhost:8545".to_string()
}

fn default_event_poll_interval_ms() -> u64 {
    4000
}

fn default_rpc_request_timeout_secs() -> u64 {
    10
}

fn default_rpc_connect_timeout_secs() -> u64 {
    3
}

impl RegistryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            ethereum_provider_url: std::env::var("ETHEREUM_PROVIDER_URL")
                .unwrap_or_else(|_| default_ethereum_provider()),
            contract_address: std::env::var("VC_STATUS_REGISTRY_ADDRESS")
                .map_err(|_| anyhow::anyhow!("VC_STATUS_REGISTRY_ADDRESS not set"))?,
            private_key: std::env::var("ISSUER_PRIVATE_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            event_poll_interval_ms: std::env::var("EVENT_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_event_poll_interval_ms),
            rpc_request_timeout_secs: std::env::var("RPC_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_rpc_request_timeout_secs),
            rpc_connect_timeout_secs: std::env::var("RPC_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_rpc_connect_timeout_secs),
        })
    }

    /// Options for the JSON-RPC network handle
    pub fn json_rpc_options(&self) -> JsonRpcOptions {
        JsonRpcOptions {
            poll_interval: Duration::from_millis(self.event_poll_interval_ms),
            request_timeout: Duration::from_secs(self.rpc_request_timeout_secs),
            connect_timeout: Duration::from_secs(self.rpc_connect_timeout_secs),
        }
    }
}
