//! Error types for the status registry client
//!
//! Configuration problems (no identity, malformed key or address) are raised
//! before the network is touched. Everything the network handle reports is
//! carried through unchanged in [`NetworkError`].

use thiserror::Error;

/// Main error type for registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A write was attempted on a read-only client
    #[error("Can not call \"{operation}\" without privateKey")]
    MissingIdentity { operation: &'static str },

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    /// Failure reported by the network handle
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Errors reported by a [`RegistryNetwork`](crate::network::RegistryNetwork)
///
/// `Clone` so a single failed nonce fetch can be handed to every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Failed to reach Ethereum provider at {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    #[error("Contract call failed: {0}")]
    ContractCall(String),

    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Failed to decode contract response: {0}")]
    Decode(String),

    #[error("No signer configured for {address}")]
    MissingSigner { address: String },
}

/// Error severity levels for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Transient errors that may resolve if the caller resubmits
    Transient,
    /// Errors requiring attention but not critical
    Warning,
    /// Errors that no amount of resubmitting will fix
    Fatal,
}

impl RegistryError {
    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RegistryError::MissingIdentity { .. } => ErrorSeverity::Fatal,
            RegistryError::InvalidPrivateKey(_) => ErrorSeverity::Fatal,
            RegistryError::InvalidAddress(_) => ErrorSeverity::Fatal,
            RegistryError::InvalidUrl(_) => ErrorSeverity::Fatal,
            RegistryError::Network(e) => e.severity(),
        }
    }

    /// Whether resubmitting the same request could succeed.
    ///
    /// Informational only; the client itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Transient)
    }

    /// Get a short error code for metrics/logging
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::MissingIdentity { .. } => "MISSING_IDENTITY",
            RegistryError::InvalidPrivateKey(_)
            | RegistryError::InvalidAddress(_)
            | RegistryError::InvalidUrl(_) => "CONFIG_ERROR",
            RegistryError::Network(e) => e.error_code(),
        }
    }
}

impl NetworkError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            NetworkError::Connectivity { .. } => ErrorSeverity::Transient,
            NetworkError::Rpc(_) => ErrorSeverity::Transient,
            NetworkError::ContractCall(_) => ErrorSeverity::Warning,
            NetworkError::Decode(_) => ErrorSeverity::Warning,
            NetworkError::MissingSigner { .. } => ErrorSeverity::Fatal,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::Connectivity { .. } => "CONNECTIVITY_ERROR",
            NetworkError::ContractCall(_) => "CONTRACT_CALL_ERROR",
            NetworkError::Rpc(_) => "RPC_ERROR",
            NetworkError::Decode(_) => "DECODE_ERROR",
            NetworkError::MissingSigner { .. } => "MISSING_SIGNER",
        }
    }
}

/// Result type alias using RegistryError
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
