//! Payout engine binary

use anyhow::Context;
use payout_engine::{
    Config, ConfirmationPoller, Ed25519Signer, Generator, JsonRpcLedgerClient, LedgerClient,
    Metrics, Processor, Scheduler, TransferSettings,
};
use payout_store::RecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn load_config() -> anyhow::Result<Config> {
    let path = PathBuf::from(
        std::env::var("PAYOUT_CONFIG").unwrap_or_else(|_| "payout.toml".to_string()),
    );

    let config = if path.exists() {
        tracing::info!(path = %path.display(), "Loading configuration file");
        Config::from_file(&path)?.with_env_overrides()?
    } else {
        tracing::info!("No configuration file, using defaults and environment");
        Config::from_env()?
    };

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = load_config().context("invalid configuration")?;
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting payout engine"
    );

    let store = Arc::new(RecordStore::open(&config.store).context("failed to open record store")?);
    if let Some(floor) = config.chain.initial_nonce_checkpoint {
        let checkpoint = store.advance_nonce_checkpoint(floor)?;
        tracing::info!(checkpoint, "Nonce checkpoint initialised");
    }

    let signer = Arc::new(
        Ed25519Signer::from_hex_seed(&config.chain.signing_key)
            .context("failed to load signing key")?,
    );
    let ledger: Arc<dyn LedgerClient> = Arc::new(JsonRpcLedgerClient::new(
        config.chain.endpoint.clone(),
        Duration::from_secs(config.chain.request_timeout_secs),
    )?);
    let metrics = Metrics::new()?;

    let generator = match Generator::new(
        store.clone(),
        ledger.clone(),
        config.chain.sender_address.clone(),
        &config.generation,
        config.reserve()?,
        metrics.clone(),
    ) {
        Ok(generator) => Some(generator),
        Err(e) => {
            tracing::warn!(error = %e, "Generation disabled");
            None
        }
    };

    let processor = Processor::new(
        store.clone(),
        ledger.clone(),
        signer,
        ConfirmationPoller::from_config(ledger, &config.processing),
        TransferSettings::from_config(&config)?,
        metrics.clone(),
    );

    let handles = Scheduler::new(processor, generator, &config).start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down payout engine");

    handles.shutdown().await;
    tracing::info!(metrics = %metrics.render(), "Final metrics");

    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => tracing::warn!("Record store still shared, skipping explicit close"),
    }

    Ok(())
}
