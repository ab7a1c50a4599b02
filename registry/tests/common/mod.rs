//! Common test utilities for integration tests

pub mod mock_network;
pub mod mock_rpc;
