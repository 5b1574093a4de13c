//! Error types for the payout engine

use num_bigint::BigUint;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Record store error
    #[error("Store error: {0}")]
    Store(#[from] payout_store::Error),

    /// Ledger RPC failure
    #[error("Chain query error: {0}")]
    ChainQuery(String),

    /// Sender balance does not strictly exceed the transfer amount
    #[error("Insufficient balance: need more than {needed}, have {available}")]
    InsufficientBalance {
        /// Transfer amount
        needed: BigUint,
        /// Balance reported by the ledger
        available: BigUint,
    },

    /// Local nonce checkpoint is behind the ledger's account nonce
    #[error("Nonce divergence: local checkpoint {local}, ledger {ledger}")]
    NonceDivergence {
        /// Store checkpoint
        local: u64,
        /// Ledger-reported account nonce
        ledger: u64,
    },

    /// Transaction did not settle before the deadline
    #[error("Confirmation timeout after {timeout:?} for transaction {tx_id}")]
    ConfirmationTimeout {
        /// Transaction id
        tx_id: String,
        /// Overall timeout
        timeout: Duration,
    },

    /// Bad key material or signing failure
    #[error("Signing error: {0}")]
    Signing(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ChainQuery(err.to_string())
    }
}
