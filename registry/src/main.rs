//! Registry status watcher
//!
//! Connects to the configured registry and logs status changes, new blocks
//! and provider errors until interrupted.

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use vc_status_registry::{RegistryClient, RegistryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vc_status_registry=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Registry status watcher starting"
    );

    let config = RegistryConfig::from_env()?;

    info!(
        ethereum_provider = %config.ethereum_provider_url,
        contract = %config.contract_address,
        read_only = config.private_key.is_none(),
        poll_interval_ms = config.event_poll_interval_ms,
        "Configuration loaded"
    );

    let client = RegistryClient::from_config(&config).await?;

    client.on_set_vc_status().subscribe_sync(|log| {
        info!(
            block_number = ?log.block_number,
            transaction_hash = ?log.transaction_hash,
            topics = ?log.topics,
            "Credential status set"
        );
    });
    client.on_remove_vc_status().subscribe_sync(|log| {
        info!(
            block_number = ?log.block_number,
            transaction_hash = ?log.transaction_hash,
            topics = ?log.topics,
            "Credential status removed"
        );
    });
    client.on_new_block().subscribe_sync(|block| {
        info!(block_number = block.block_number, "New block");
    });
    client.on_error().subscribe_sync(|error| {
        warn!(error = %error, "Provider error");
    });

    match client.get_block_number().await {
        Ok(block_number) => info!(block_number, "Connected to Ethereum provider"),
        Err(e) => warn!(error = %e, code = e.error_code(), "Initial block number query failed"),
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    drop(client);
    info!("Registry status watcher stopped");
    Ok(())
}
