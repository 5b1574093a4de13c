//! Core types for the record store
//!
//! Amounts are arbitrary-precision integers in the smallest native unit,
//! never fixed-width, so that balances above 2^64 survive storage intact.

use chrono::Utc;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a disbursement record
///
/// Transitions only move forward one step: `Pending -> Claimed -> Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u64)]
pub enum Status {
    /// Waiting to be claimed by a processor
    Pending = 0,
    /// Claimed by exactly one processor, transfer in flight or stuck
    Claimed = 1,
    /// Transfer left the pending pool the required number of times (terminal)
    Confirmed = 2,
}

impl Status {
    /// Stored numeric code
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Parse from the stored numeric code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Status::Pending),
            1 => Some(Status::Claimed),
            2 => Some(Status::Confirmed),
            _ => None,
        }
    }

    /// The only status this one may move to
    pub fn next(self) -> Option<Self> {
        match self {
            Status::Pending => Some(Status::Claimed),
            Status::Claimed => Some(Status::Confirmed),
            Status::Confirmed => None,
        }
    }

    /// Whether `self -> to` is a legal transition
    pub fn can_transition_to(self, to: Status) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Pending => "pending",
            Status::Claimed => "claimed",
            Status::Confirmed => "confirmed",
        };
        write!(f, "{}", name)
    }
}

/// A disbursement as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisbursementRecord {
    /// Unique, strictly increasing id assigned by the store
    pub id: u64,

    /// Destination address on the ledger
    pub destination: String,

    /// Amount in the smallest native unit
    pub amount: BigUint,

    /// Reserved; not read by the processing loop
    pub nonce_hint: u64,

    /// Current lifecycle status
    pub status: Status,

    /// Ledger transaction id, empty until broadcast
    pub transaction_id: String,

    /// Creation time (unix seconds)
    pub created_at: u64,

    /// Last modification time (unix seconds)
    pub modified_at: u64,
}

/// A record to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Destination address on the ledger
    pub destination: String,

    /// Amount in the smallest native unit
    pub amount: BigUint,

    /// Reserved; not read by the processing loop
    pub nonce_hint: u64,

    /// Creation time (unix seconds)
    pub created_at: u64,
}

impl NewRecord {
    /// New pending record stamped with the current time
    pub fn pending(destination: impl Into<String>, amount: BigUint) -> Self {
        Self {
            destination: destination.into(),
            amount,
            nonce_hint: 0,
            created_at: unix_now(),
        }
    }
}

/// Store-owned singleton counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Next record id to assign (`kv-id`)
    NextId,
    /// Local account nonce checkpoint (`kv-nonce`)
    NonceCheckpoint,
}

impl Counter {
    /// Storage key
    pub fn key(self) -> &'static [u8] {
        match self {
            Counter::NextId => b"kv-id",
            Counter::NonceCheckpoint => b"kv-nonce",
        }
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for status in [Status::Pending, Status::Claimed, Status::Confirmed] {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(3), None);
    }

    #[test]
    fn test_status_transitions_are_forward_single_steps() {
        assert!(Status::Pending.can_transition_to(Status::Claimed));
        assert!(Status::Claimed.can_transition_to(Status::Confirmed));

        assert!(!Status::Pending.can_transition_to(Status::Confirmed));
        assert!(!Status::Claimed.can_transition_to(Status::Pending));
        assert!(!Status::Confirmed.can_transition_to(Status::Pending));
        assert!(!Status::Confirmed.can_transition_to(Status::Claimed));
        assert!(!Status::Pending.can_transition_to(Status::Pending));
    }
}
