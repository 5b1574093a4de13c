//! Disbursement generator
//!
//! Turns the sender's live balance into one batch of `Pending` records,
//! split across recipients by weight, after withholding a reserve for fees.
//! Integer division truncates each share, so the sum of amounts never
//! exceeds the available balance; the remainder stays in the account.

use crate::{
    chain::LedgerClient,
    config::{GenerationConfig, RecipientWeight},
    metrics::Metrics,
    Error, Result,
};
use num_bigint::BigUint;
use payout_store::{NewRecord, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Split `balance - reserve` across `recipients` by weight
///
/// Returns `None` when the balance does not exceed the reserve, or when the
/// weights sum to zero (which [`Generator::new`] refuses). Amounts are
/// `floor(available * weight / total_weight)` in recipient order.
pub fn compute_allocations(
    balance: &BigUint,
    reserve: &BigUint,
    recipients: &[RecipientWeight],
) -> Option<Vec<BigUint>> {
    if balance <= reserve {
        return None;
    }

    let available = balance - reserve;
    let total: BigUint = recipients.iter().map(|r| BigUint::from(r.weight)).sum();
    if total == BigUint::default() {
        return None;
    }

    Some(
        recipients
            .iter()
            .map(|r| &available * BigUint::from(r.weight) / &total)
            .collect(),
    )
}

/// Outcome of one generation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Records were inserted with these ids
    Generated(Vec<u64>),
    /// Balance did not exceed the reserve
    BelowReserve,
    /// Balance could not be read within the retry budget
    BalanceUnavailable,
    /// Insert failed; nothing was written
    StoreFailed,
}

/// Periodic producer of disbursement records
pub struct Generator {
    store: Arc<RecordStore>,
    ledger: Arc<dyn LedgerClient>,
    sender: String,
    recipients: Vec<RecipientWeight>,
    reserve: BigUint,
    retry_attempts: u32,
    retry_delay: Duration,
    metrics: Metrics,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("sender", &self.sender)
            .field("recipients", &self.recipients.len())
            .field("reserve", &self.reserve)
            .finish()
    }
}

impl Generator {
    /// Create a generator
    pub fn new(
        store: Arc<RecordStore>,
        ledger: Arc<dyn LedgerClient>,
        sender: impl Into<String>,
        config: &GenerationConfig,
        reserve: BigUint,
        metrics: Metrics,
    ) -> Result<Self> {
        if config.recipients.is_empty() {
            return Err(Error::Config("no recipients configured".to_string()));
        }

        if config.recipients.iter().all(|r| r.weight == 0) {
            return Err(Error::Config("recipient weights sum to zero".to_string()));
        }

        Ok(Self {
            store,
            ledger,
            sender: sender.into(),
            recipients: config.recipients.clone(),
            reserve,
            retry_attempts: config.balance_retry_attempts.max(1),
            retry_delay: Duration::from_secs(config.balance_retry_delay_secs),
            metrics,
        })
    }

    /// Run one generation cycle; failures are logged, never returned
    pub async fn run_once(&self) -> GenerationOutcome {
        let Some(balance) = self.read_balance().await else {
            error!(
                attempts = self.retry_attempts,
                "Giving up on this generation cycle, balance unavailable"
            );
            return GenerationOutcome::BalanceUnavailable;
        };

        let Some(amounts) = compute_allocations(&balance, &self.reserve, &self.recipients) else {
            info!(%balance, reserve = %self.reserve, "Balance does not exceed reserve, skipping");
            return GenerationOutcome::BelowReserve;
        };

        let records: Vec<NewRecord> = self
            .recipients
            .iter()
            .zip(amounts)
            .map(|(recipient, amount)| NewRecord::pending(recipient.address.clone(), amount))
            .collect();

        match self.store.insert_batch(records) {
            Ok(ids) => {
                self.metrics.records_generated.inc_by(ids.len() as u64);
                info!(count = ids.len(), %balance, "Generated disbursements");
                GenerationOutcome::Generated(ids)
            }
            Err(e) => {
                error!(error = %e, "Failed to insert disbursements");
                GenerationOutcome::StoreFailed
            }
        }
    }

    async fn read_balance(&self) -> Option<BigUint> {
        for attempt in 1..=self.retry_attempts {
            match self.ledger.balance(&self.sender).await {
                Ok(balance) => {
                    debug!(attempt, %balance, "Read sender balance");
                    return Some(balance);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Failed to get balance");
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        None
    }
}
