//! Payout Record Store
//!
//! Durable, transactional table of disbursement records on RocksDB.
//!
//! # Architecture
//!
//! - **Field-per-key layout**: each record field is its own key, indexed by
//!   an 8-byte big-endian id so scans come out in id order
//! - **Transactions**: batch inserts, id allocation and status changes are
//!   single RocksDB transactions
//! - **Compare-and-swap**: the only exclusivity primitive; at most one
//!   caller wins each `(id, expected status)` pair
//!
//! # Invariants
//!
//! - Record ids are unique and only increase
//! - Status moves `Pending -> Claimed -> Confirmed`, one step at a time
//! - Amounts are arbitrary precision, never truncated
//! - Records are never deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod codec;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

// Re-exports
pub use config::{RocksDBConfig, StoreConfig};
pub use error::{Error, Result};
pub use storage::RecordStore;
pub use types::{Counter, DisbursementRecord, NewRecord, Status};
pub use num_bigint::BigUint;
