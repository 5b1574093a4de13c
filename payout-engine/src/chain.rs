//! Ledger client facade
//!
//! The capability set the engine consumes from the external ledger: read
//! balance and account nonce, suggest a fee price, broadcast a signed
//! transfer and ask whether a transaction is still pending. Everything
//! else about the network stays behind this trait.

use crate::Result;
use async_trait::async_trait;
use num_bigint::BigUint;

/// Gas limit of a plain native-currency transfer
pub const SIMPLE_TRANSFER_GAS: u64 = 21_000;

/// 1 gwei in base units
pub const GWEI: u64 = 1_000_000_000;

/// 1 ether in base units
pub fn ether() -> BigUint {
    BigUint::from(GWEI) * BigUint::from(GWEI)
}

/// Pending-pool view of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Known to the ledger, still in the pending pool
    Pending,
    /// Known to the ledger, no longer pending
    Settled,
    /// Unknown to the ledger
    NotFound,
}

/// Unsigned native-currency transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Network / chain identifier
    pub chain_id: u64,
    /// Sender account nonce
    pub nonce: u64,
    /// Recipient address
    pub to: String,
    /// Amount in base units
    pub amount: BigUint,
    /// Fee price per gas unit
    pub fee_price: BigUint,
    /// Gas limit
    pub gas_limit: u64,
}

impl Transfer {
    /// Deterministic bytes covered by the signature
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.to.len());
        out.extend_from_slice(&self.chain_id.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.gas_limit.to_be_bytes());
        put_len_prefixed(&mut out, &self.fee_price.to_bytes_be());
        put_len_prefixed(&mut out, &self.amount.to_bytes_be());
        put_len_prefixed(&mut out, self.to.as_bytes());
        out
    }
}

fn put_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Transfer plus signature, ready to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    /// The signed transfer
    pub transfer: Transfer,
    /// Signature over [`Transfer::canonical_bytes`]
    pub signature: Vec<u8>,
    /// Signer public key
    pub public_key: Vec<u8>,
    /// Wire encoding submitted to the ledger
    pub raw: Vec<u8>,
}

/// External ledger capabilities
///
/// Every failure is reported as [`crate::Error::ChainQuery`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Balance of `address` in base units
    async fn balance(&self, address: &str) -> Result<BigUint>;

    /// Next nonce the ledger expects from `address`
    async fn account_nonce(&self, address: &str) -> Result<u64>;

    /// Suggested fee price per gas unit
    async fn suggest_fee_price(&self) -> Result<BigUint>;

    /// Pending state of a transaction by id
    async fn transaction_state(&self, tx_id: &str) -> Result<TxState>;

    /// Submit a signed transfer; returns its transaction id
    async fn broadcast(&self, transfer: &SignedTransfer) -> Result<String>;
}
