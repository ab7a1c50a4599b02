//! Mock Ethereum JSON-RPC endpoint for integration testing
//!
//! Provides a wiremock-based server answering the handful of JSON-RPC methods
//! the registry client uses. Responses echo the request id.

use alloy::primitives::{keccak256, B256};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use wiremock::{
    matchers::{body_partial_json, method},
    Mock, MockServer, ResponseTemplate,
};

/// Mock JSON-RPC state
#[derive(Debug, Default)]
pub struct MockRpcState {
    /// Method and params of every request received, in order
    pub calls: Vec<(String, Value)>,
}

/// Mock JSON-RPC server
pub struct MockRpcServer {
    server: MockServer,
    state: Arc<RwLock<MockRpcState>>,
}

fn request_id(req: &wiremock::Request) -> Value {
    req.body_json::<Value>()
        .map(|body| body["id"].clone())
        .unwrap_or(Value::Null)
}

fn record(state: &RwLock<MockRpcState>, req: &wiremock::Request) {
    if let Ok(body) = req.body_json::<Value>() {
        if let Some(rpc_method) = body["method"].as_str() {
            state
                .write()
                .unwrap()
                .calls
                .push((rpc_method.to_string(), body["params"].clone()));
        }
    }
}

impl MockRpcServer {
    /// Start a new mock JSON-RPC server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(RwLock::new(MockRpcState::default()));

        Self { server, state }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answer `rpc_method` with a fixed result
    pub async fn mock_result(&self, rpc_method: &str, result: Value) {
        let state = Arc::clone(&self.state);

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(move |req: &wiremock::Request| {
                record(&state, req);
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": request_id(req),
                    "result": result.clone(),
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// Answer `rpc_method` with a JSON-RPC error object
    pub async fn mock_error(&self, rpc_method: &str, code: i64, message: &str) {
        let state = Arc::clone(&self.state);
        let message = message.to_string();

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(move |req: &wiremock::Request| {
                record(&state, req);
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": request_id(req),
                    "error": { "code": code, "message": message.clone() },
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// `eth_blockNumber` returning `start`, then one higher on every call
    pub async fn mock_advancing_block_number(&self, start: u64) {
        let state = Arc::clone(&self.state);
        let next = Arc::new(AtomicU64::new(start));

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
            .respond_with(move |req: &wiremock::Request| {
                record(&state, req);
                let block_number = next.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": request_id(req),
                    "result": format!("0x{:x}", block_number),
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// Everything a wallet-backed provider needs to fill, sign and broadcast
    /// a transaction, with `transaction_count` as the account's nonce
    pub async fn mock_transaction_submission(&self, transaction_count: u64) {
        let gwei = "0x3b9aca00";
        let zero_hash = format!("0x{}", "00".repeat(32));

        self.mock_result(
            "eth_getTransactionCount",
            json!(format!("0x{:x}", transaction_count)),
        )
        .await;
        self.mock_result("eth_chainId", json!("0x539")).await;
        self.mock_result("eth_estimateGas", json!("0x5208")).await;
        self.mock_result(
            "eth_feeHistory",
            json!({
                "oldestBlock": "0x10",
                "baseFeePerGas": [gwei, gwei],
                "gasUsedRatio": [0.5],
                "reward": [[gwei]],
            }),
        )
        .await;
        self.mock_result(
            "eth_getBlockByNumber",
            json!({
                "hash": format!("0x{}", "11".repeat(32)),
                "parentHash": zero_hash,
                "sha3Uncles": zero_hash,
                "miner": format!("0x{}", "00".repeat(20)),
                "stateRoot": zero_hash,
                "transactionsRoot": zero_hash,
                "receiptsRoot": zero_hash,
                "logsBloom": format!("0x{}", "00".repeat(256)),
                "difficulty": "0x0",
                "number": "0x10",
                "gasLimit": "0x1c9c380",
                "gasUsed": "0x0",
                "timestamp": "0x6553f100",
                "extraData": "0x",
                "mixHash": zero_hash,
                "nonce": "0x0000000000000000",
                "baseFeePerGas": gwei,
                "uncles": [],
                "transactions": [],
            }),
        )
        .await;

        let state = Arc::clone(&self.state);
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
            .respond_with(move |req: &wiremock::Request| {
                record(&state, req);
                let raw = req
                    .body_json::<Value>()
                    .map(|body| body["params"][0].to_string())
                    .unwrap_or_default();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": request_id(req),
                    "result": keccak256(raw.as_bytes()),
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// `eth_getLogs` returning `logs` for filters on `topic`, nothing otherwise
    pub async fn mock_logs_for_topic(&self, topic: B256, logs: Value) {
        let state = Arc::clone(&self.state);
        let topic = hex::encode(topic);

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getLogs" })))
            .respond_with(move |req: &wiremock::Request| {
                record(&state, req);
                let filter = req
                    .body_json::<Value>()
                    .map(|body| body["params"].to_string().to_lowercase())
                    .unwrap_or_default();
                let result = if filter.contains(&topic) {
                    logs.clone()
                } else {
                    json!([])
                };
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": request_id(req),
                    "result": result,
                }))
            })
            .mount(&self.server)
            .await;
    }

    /// Params of every `rpc_method` request, in arrival order
    pub async fn params(&self, rpc_method: &str) -> Vec<Value> {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|(called, _)| called.as_str() == rpc_method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Number of times `rpc_method` was called
    pub async fn call_count(&self, rpc_method: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|(called, _)| called.as_str() == rpc_method)
            .count()
    }
}

/// ABI-encoded `bool` return value
pub fn abi_bool(value: bool) -> Value {
    json!(format!("0x{:064x}", value as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let mock = MockRpcServer::start().await;
        assert!(!mock.url().is_empty());
    }

    #[test]
    fn test_abi_bool() {
        assert_eq!(
            abi_bool(true),
            json!("0x0000000000000000000000000000000000000000000000000000000000000001")
        );
    }
}
