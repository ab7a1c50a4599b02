//! Signing identity for registry writes
//!
//! Private keys are never logged; `Debug` only shows the address.

use std::fmt;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Issuer identity: a private key and the address derived from it
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key (with or without 0x prefix)
    pub fn from_private_key(private_key_hex: &str) -> RegistryResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| RegistryError::InvalidPrivateKey(format!("{}", e)))?;

        debug!(address = %signer.address(), "Wallet loaded");

        Ok(Self { signer })
    }

    /// Address the registry records as issuer for this wallet's writes
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The private key as 0x-prefixed hex
    pub fn private_key(&self) -> String {
        format!("0x{}", hex::encode(self.signer.to_bytes().as_slice()))
    }

    /// Signer wrapped for an alloy provider's wallet filler
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
