//! Shared fixtures: a scripted in-memory ledger and a temporary store

#![allow(dead_code)]

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::Mutex;
use payout_engine::{
    ConfirmationPoller, Ed25519Signer, Error, LedgerClient, Metrics, Processor, Result,
    SignedTransfer, TransferSettings, TxState,
};
use payout_store::{RecordStore, StoreConfig};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SENDER: &str = "0xsender";

#[derive(Debug)]
struct LedgerState {
    balance: BigUint,
    balance_failures: u32,
    nonce: u64,
    fee_price: BigUint,
    /// `None` answers the query with an error
    states: VecDeque<Option<TxState>>,
    default_state: TxState,
    fail_broadcast: bool,
    broadcasts: Vec<SignedTransfer>,
    balance_calls: u32,
    state_calls: u32,
}

/// In-memory ledger driven by a script
///
/// Broadcasts debit the balance and bump the account nonce. Transaction
/// state queries pop the scripted queue, then fall back to `default_state`.
/// A scripted `None` fails that query with `ChainQuery`.
#[derive(Debug)]
pub struct StubLedger {
    state: Mutex<LedgerState>,
}

impl StubLedger {
    pub fn new(balance: u64) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                balance: BigUint::from(balance),
                balance_failures: 0,
                nonce: 1,
                fee_price: BigUint::from(20u32),
                states: VecDeque::new(),
                default_state: TxState::Settled,
                fail_broadcast: false,
                broadcasts: Vec::new(),
                balance_calls: 0,
                state_calls: 0,
            }),
        }
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.state.lock().nonce = nonce;
    }

    pub fn fail_balance_reads(&self, count: u32) {
        self.state.lock().balance_failures = count;
    }

    pub fn fail_broadcasts(&self) {
        self.state.lock().fail_broadcast = true;
    }

    pub fn script_states(&self, states: impl IntoIterator<Item = TxState>) {
        self.state.lock().states.extend(states.into_iter().map(Some));
    }

    pub fn script_answers(&self, answers: impl IntoIterator<Item = Option<TxState>>) {
        self.state.lock().states.extend(answers);
    }

    pub fn set_default_state(&self, state: TxState) {
        self.state.lock().default_state = state;
    }

    pub fn broadcasts(&self) -> Vec<SignedTransfer> {
        self.state.lock().broadcasts.clone()
    }

    pub fn balance_calls(&self) -> u32 {
        self.state.lock().balance_calls
    }

    pub fn state_calls(&self) -> u32 {
        self.state.lock().state_calls
    }
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn balance(&self, _address: &str) -> Result<BigUint> {
        let mut state = self.state.lock();
        state.balance_calls += 1;
        if state.balance_failures > 0 {
            state.balance_failures -= 1;
            return Err(Error::ChainQuery("connection refused".to_string()));
        }
        Ok(state.balance.clone())
    }

    async fn account_nonce(&self, _address: &str) -> Result<u64> {
        Ok(self.state.lock().nonce)
    }

    async fn suggest_fee_price(&self) -> Result<BigUint> {
        Ok(self.state.lock().fee_price.clone())
    }

    async fn transaction_state(&self, _tx_id: &str) -> Result<TxState> {
        let mut state = self.state.lock();
        state.state_calls += 1;
        match state.states.pop_front() {
            Some(Some(answer)) => Ok(answer),
            Some(None) => Err(Error::ChainQuery("header not found".to_string())),
            None => Ok(state.default_state),
        }
    }

    async fn broadcast(&self, transfer: &SignedTransfer) -> Result<String> {
        let mut state = self.state.lock();
        if state.fail_broadcast {
            return Err(Error::ChainQuery("insufficient funds for gas".to_string()));
        }

        let tx_id = format!("0xtx{:04}", transfer.transfer.nonce);
        state.balance -= &transfer.transfer.amount;
        state.nonce += 1;
        state.broadcasts.push(transfer.clone());
        Ok(tx_id)
    }
}

pub fn open_store() -> (Arc<RecordStore>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Arc::new(RecordStore::open(&config).unwrap()), temp_dir)
}

pub fn settings() -> TransferSettings {
    TransferSettings {
        sender: SENDER.to_string(),
        chain_id: 1,
        gas_limit: 21_000,
        fee_bump: BigUint::from(5u32),
    }
}

/// Processor with threshold 3, 30s polls and the given confirmation timeout
pub fn processor(
    store: Arc<RecordStore>,
    ledger: Arc<StubLedger>,
    timeout: Duration,
    metrics: Metrics,
) -> Processor {
    let poller = ConfirmationPoller::new(ledger.clone(), 3, timeout, Duration::from_secs(30));
    Processor::new(
        store,
        ledger,
        Arc::new(Ed25519Signer::from_seed(&[7u8; 32])),
        poller,
        settings(),
        metrics,
    )
}
