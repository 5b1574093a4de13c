//! Claim / broadcast / confirm state machine
//!
//! # Lifecycle
//!
//! ```text
//!   Pending ──CAS──▶ Claimed ──broadcast + poll──▶ CAS ──▶ Confirmed
//!                       │
//!                       └── any failure: stays Claimed (manual remediation)
//! ```
//!
//! Records are handled one at a time. Each transfer draws a fresh account
//! nonce from the ledger, so concurrent submissions from one sender would
//! race for the same nonce.
//!
//! Before touching any record an iteration checks that the local nonce
//! checkpoint is not behind the ledger's account nonce. A ledger nonce ahead
//! of the checkpoint means something outside this process spent from the
//! account, and the whole iteration is refused.

use crate::{
    chain::{LedgerClient, SignedTransfer, Transfer},
    config::Config,
    confirmation::ConfirmationPoller,
    crypto::{hash_bytes, TransferSigner},
    metrics::Metrics,
    Error, Result,
};
use num_bigint::BigUint;
use payout_store::{DisbursementRecord, RecordStore, Status};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Sender-side parameters of every transfer
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Custodial sender address
    pub sender: String,
    /// Network / chain identifier
    pub chain_id: u64,
    /// Gas limit per transfer
    pub gas_limit: u64,
    /// Added to the ledger's suggested fee price
    pub fee_bump: BigUint,
}

impl TransferSettings {
    /// Extract from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            sender: config.chain.sender_address.clone(),
            chain_id: config.chain.chain_id,
            gas_limit: config.chain.gas_limit,
            fee_bump: config.fee_bump()?,
        })
    }
}

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Transfer confirmed, record is `Confirmed`
    Confirmed,
    /// Another actor claimed the record first
    Skipped,
}

/// Summary of one iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Records confirmed
    pub confirmed: usize,
    /// Records skipped on a lost claim
    pub skipped: usize,
    /// Records whose processing failed
    pub failed: usize,
    /// `Claimed` records found at the start of the iteration
    pub stuck: usize,
}

/// Drains unclaimed records and drives them to confirmation
pub struct Processor {
    store: Arc<RecordStore>,
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransferSigner>,
    poller: ConfirmationPoller,
    settings: TransferSettings,
    metrics: Metrics,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("store", &self.store)
            .field("poller", &self.poller)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Processor {
    /// Create a processor
    pub fn new(
        store: Arc<RecordStore>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransferSigner>,
        poller: ConfirmationPoller,
        settings: TransferSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            ledger,
            signer,
            poller,
            settings,
            metrics,
        }
    }

    /// Run one pass over every `Pending` record
    ///
    /// Fails only on iteration-level problems (nonce divergence, ledger or
    /// store unreachable before any record is touched). Per-record failures
    /// are logged and counted in the report.
    pub async fn run_iteration(&self) -> Result<IterationReport> {
        let result = self.drain().await;
        if result.is_err() {
            self.metrics.iterations_aborted.inc();
        }
        result
    }

    async fn drain(&self) -> Result<IterationReport> {
        self.check_nonce().await?;

        let mut report = IterationReport::default();

        let stuck = self.store.list_by_status(Status::Claimed)?;
        if !stuck.is_empty() {
            report.stuck = stuck.len();
            warn!(
                count = stuck.len(),
                ids = ?stuck,
                "Claimed records without confirmation, manual remediation may be needed"
            );
        }

        let ids = self.store.list_unhandled()?;
        info!(count = ids.len(), "Start handling");

        for id in ids {
            match self.process_record(id).await {
                Ok(RecordOutcome::Confirmed) => report.confirmed += 1,
                Ok(RecordOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    self.metrics.record_failures.inc();
                    error!(id, error = %e, "Failed to process disbursement");
                }
            }
        }

        info!(
            confirmed = report.confirmed,
            skipped = report.skipped,
            failed = report.failed,
            "Finish handling"
        );
        Ok(report)
    }

    async fn check_nonce(&self) -> Result<()> {
        let local = self.store.nonce_checkpoint()?;
        let ledger = self.ledger.account_nonce(&self.settings.sender).await?;

        if local < ledger {
            error!(local, ledger, "Wrong nonce count, refusing to process");
            return Err(Error::NonceDivergence { local, ledger });
        }

        debug!(local, ledger, "Nonce checkpoint ok");
        Ok(())
    }

    /// Claim, send and confirm one record
    pub async fn process_record(&self, id: u64) -> Result<RecordOutcome> {
        match self
            .store
            .compare_and_swap_status(id, Status::Pending, Status::Claimed)
        {
            Ok(()) => self.metrics.claims.inc(),
            Err(e) if e.is_conflict() => {
                self.metrics.claim_conflicts.inc();
                debug!(id, error = %e, "Record already claimed, skipping");
                return Ok(RecordOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        let record = self.store.get(id)?;
        let signed = self.build_transfer(&record).await?;

        debug!(
            id,
            nonce = signed.transfer.nonce,
            payload = %hex::encode(hash_bytes(&signed.raw)),
            "Broadcasting transfer"
        );
        let tx_id = self.ledger.broadcast(&signed).await?;
        self.metrics.broadcasts.inc();
        info!(id, tx_id = %tx_id, to = %record.destination, amount = %record.amount, "Broadcast succeeded");

        if let Err(e) = self
            .store
            .advance_nonce_checkpoint(signed.transfer.nonce.saturating_add(1))
        {
            warn!(id, error = %e, "Failed to advance nonce checkpoint");
        }
        if let Err(e) = self.store.set_transaction_id(id, &tx_id) {
            warn!(id, tx_id = %tx_id, error = %e, "Failed to record transaction id");
        }

        let started = Instant::now();
        let polls = self.poller.wait(&tx_id).await?;
        self.metrics
            .confirmation_wait
            .observe(started.elapsed().as_secs_f64());

        self.store
            .compare_and_swap_status(id, Status::Claimed, Status::Confirmed)?;
        self.metrics.confirmations.inc();
        info!(id, tx_id = %tx_id, polls, "Disbursement confirmed");

        Ok(RecordOutcome::Confirmed)
    }

    async fn build_transfer(&self, record: &DisbursementRecord) -> Result<SignedTransfer> {
        let sender = &self.settings.sender;

        let nonce = self.ledger.account_nonce(sender).await?;
        let suggested = self.ledger.suggest_fee_price().await?;

        // Point-in-time check; a concurrent spender can still drain the account
        let balance = self.ledger.balance(sender).await?;
        if balance <= record.amount {
            return Err(Error::InsufficientBalance {
                needed: record.amount.clone(),
                available: balance,
            });
        }

        let transfer = Transfer {
            chain_id: self.settings.chain_id,
            nonce,
            to: record.destination.clone(),
            amount: record.amount.clone(),
            fee_price: suggested + &self.settings.fee_bump,
            gas_limit: self.settings.gas_limit,
        };

        self.signer.sign_transfer(transfer)
    }
}
