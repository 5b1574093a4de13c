//! Settlement polling
//!
//! Polls a broadcast transaction until the ledger has reported it as not
//! pending `threshold` times. The count is cumulative: pending answers and
//! query errors neither add to it nor reset it. Leaving the pending pool is
//! all this establishes; execution success is not checked.

use crate::{
    chain::{LedgerClient, TxState},
    config::ProcessingConfig,
    Error, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Waits for a transaction to leave the pending pool
pub struct ConfirmationPoller {
    ledger: Arc<dyn LedgerClient>,
    threshold: u32,
    timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for ConfirmationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationPoller")
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl ConfirmationPoller {
    /// Create a poller
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        threshold: u32,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            threshold: threshold.max(1),
            timeout,
            poll_interval,
        }
    }

    /// Create a poller from processing configuration
    pub fn from_config(ledger: Arc<dyn LedgerClient>, config: &ProcessingConfig) -> Self {
        Self::new(
            ledger,
            config.confirmation_threshold,
            config.confirmation_timeout(),
            config.poll_interval(),
        )
    }

    /// Poll until confirmed; returns the number of polls made
    pub async fn wait(&self, tx_id: &str) -> Result<u32> {
        let deadline = Instant::now() + self.timeout;
        // First poll one interval after broadcast
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sightings = 0u32;
        let mut polls = 0u32;

        loop {
            ticker.tick().await;

            if Instant::now() > deadline {
                return Err(Error::ConfirmationTimeout {
                    tx_id: tx_id.to_string(),
                    timeout: self.timeout,
                });
            }

            polls += 1;
            match self.ledger.transaction_state(tx_id).await {
                Ok(TxState::Settled) => {
                    sightings += 1;
                    debug!(tx_id, polls, sightings, "Transaction not pending");
                    if sightings >= self.threshold {
                        return Ok(polls);
                    }
                }
                Ok(state) => {
                    debug!(tx_id, polls, ?state, "Transaction still pending");
                }
                Err(e) => {
                    warn!(tx_id, polls, error = %e, "Failed to get transaction state");
                }
            }
        }
    }
}
