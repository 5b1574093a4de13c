//! Payout Engine
//!
//! Generates weighted disbursements from a custodial account and drives each
//! one through claim, broadcast and confirmation.
//!
//! # Architecture
//!
//! 1. **Generation**: read the sender balance, withhold a reserve, split the
//!    rest by weight into `Pending` records
//! 2. **Claim**: compare-and-swap `Pending -> Claimed`; losers skip
//! 3. **Broadcast**: sign a transfer with a fresh ledger nonce and submit it
//! 4. **Confirmation**: poll until the transaction has been seen settled
//!    `threshold` times, then compare-and-swap `Claimed -> Confirmed`
//!
//! A record that fails after its claim stays `Claimed`. Nothing retries it
//! automatically, so a transfer is never sent twice.
//!
//! # Example
//!
//! ```no_run
//! use payout_engine::{
//!     Config, ConfirmationPoller, Ed25519Signer, JsonRpcLedgerClient, Metrics, Processor,
//!     TransferSettings,
//! };
//! use payout_store::RecordStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> payout_engine::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(RecordStore::open(&config.store)?);
//!     let ledger = Arc::new(JsonRpcLedgerClient::new(
//!         config.chain.endpoint.clone(),
//!         std::time::Duration::from_secs(config.chain.request_timeout_secs),
//!     )?);
//!     let signer = Arc::new(Ed25519Signer::from_hex_seed(&config.chain.signing_key)?);
//!
//!     let processor = Processor::new(
//!         store,
//!         ledger.clone(),
//!         signer,
//!         ConfirmationPoller::from_config(ledger, &config.processing),
//!         TransferSettings::from_config(&config)?,
//!         Metrics::new().expect("metrics"),
//!     );
//!
//!     let report = processor.run_iteration().await?;
//!     println!("confirmed {} disbursements", report.confirmed);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod chain;
pub mod config;
pub mod confirmation;
pub mod crypto;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod processor;
pub mod rpc;
pub mod scheduler;

// Re-exports
pub use chain::{LedgerClient, SignedTransfer, Transfer, TxState};
pub use config::{ChainConfig, Config, GenerationConfig, ProcessingConfig, RecipientWeight};
pub use confirmation::ConfirmationPoller;
pub use crypto::{Ed25519Signer, TransferSigner};
pub use error::{Error, Result};
pub use generator::{compute_allocations, GenerationOutcome, Generator};
pub use metrics::Metrics;
pub use processor::{IterationReport, Processor, RecordOutcome, TransferSettings};
pub use rpc::JsonRpcLedgerClient;
pub use scheduler::{Scheduler, SchedulerHandles};
