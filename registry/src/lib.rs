//! Verifiable Credential Status Registry client
//!
//! Reads and writes credential status on the on-chain registry contract and
//! republishes the contract's events as typed notifications.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod network;
pub mod rpc;
pub mod sequence;
pub mod types;
pub mod wallet;


pub use client::RegistryClient;
pub use config::RegistryConfig;
pub use error::{NetworkError, RegistryError, RegistryResult};
pub use events::{EventChannel, EventRouter, Subscription};
pub use network::RegistryNetwork;
pub use rpc::{JsonRpcNetwork, JsonRpcOptions};
pub use types::*;
pub use wallet::Wallet;
