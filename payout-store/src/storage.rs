//! Storage layer using RocksDB
//!
//! Records are spread over seven keys (see [`crate::codec`]) in a single
//! keyspace. Every multi-key mutation and every read-modify-write runs
//! inside a pessimistic RocksDB transaction: `get_for_update` locks the key
//! until commit, so two claimers of the same id serialize and the loser
//! observes the winner's status.
//!
//! # Counters
//!
//! - `kv-id` - next record id to assign, bumped in the same transaction
//!   that writes the record fields
//! - `kv-nonce` - local account nonce checkpoint, only ever raised

use crate::{
    codec::{self, FieldPrefix},
    config::StoreConfig,
    error::{Error, Result},
    types::{unix_now, Counter, DisbursementRecord, NewRecord, Status},
};
use rocksdb::{
    Direction, ErrorKind, IteratorMode, Options, Transaction, TransactionDB,
    TransactionDBOptions, WriteOptions,
};
use std::path::PathBuf;

/// Initial value of both counters
pub const INITIAL_COUNTER: u64 = 1;

/// Persistent, transactional table of disbursement records
pub struct RecordStore {
    db: TransactionDB,
    path: PathBuf,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.path)
            .finish()
    }
}

impl RecordStore {
    /// Open or create the store and bootstrap its counters
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(config.lock_timeout_ms);

        let db: TransactionDB = TransactionDB::open(&db_opts, &txn_db_opts, path)?;
        let store = Self {
            db,
            path: path.clone(),
        };

        let next_id = store.get_or_initialize(Counter::NextId, INITIAL_COUNTER)?;
        let nonce = store.get_or_initialize(Counter::NonceCheckpoint, INITIAL_COUNTER)?;

        tracing::info!(
            path = ?path,
            next_id,
            nonce_checkpoint = nonce,
            "Opened record store"
        );

        Ok(store)
    }

    // Counter operations

    /// Set `counter` to `initial` only if it is absent; returns the stored value
    pub fn get_or_initialize(&self, counter: Counter, initial: u64) -> Result<u64> {
        let txn = self.db.transaction();

        if let Some(raw) = txn.get_for_update(counter.key(), true)? {
            return codec::decode_u64(&raw);
        }

        txn.put(counter.key(), codec::encode_u64(initial))?;
        txn.commit()?;

        tracing::debug!(counter = ?counter, initial, "Counter initialized");
        Ok(initial)
    }

    /// Read a counter
    pub fn counter(&self, counter: Counter) -> Result<u64> {
        let raw = self
            .db
            .get(counter.key())?
            .ok_or_else(|| Error::NotFound(format!("counter {:?}", counter)))?;
        codec::decode_u64(&raw)
    }

    /// Local account nonce checkpoint
    pub fn nonce_checkpoint(&self) -> Result<u64> {
        self.counter(Counter::NonceCheckpoint)
    }

    /// Raise the nonce checkpoint to `nonce` if it is lower; never lowers it
    pub fn advance_nonce_checkpoint(&self, nonce: u64) -> Result<u64> {
        let key = Counter::NonceCheckpoint.key();
        let txn = self.db.transaction();

        let current = match txn.get_for_update(key, true)? {
            Some(raw) => codec::decode_u64(&raw)?,
            None => return Err(Error::NotFound("counter NonceCheckpoint".to_string())),
        };

        if nonce <= current {
            return Ok(current);
        }

        txn.put(key, codec::encode_u64(nonce))?;
        txn.commit()?;

        tracing::debug!(from = current, to = nonce, "Nonce checkpoint advanced");
        Ok(nonce)
    }

    // Record operations

    /// Insert one record
    pub fn insert(&self, record: NewRecord) -> Result<u64> {
        let ids = self.insert_batch(vec![record])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| Error::Storage("insert allocated no id".to_string()))
    }

    /// Insert records atomically; returns the allocated ids in input order
    ///
    /// Either every record (and the bumped `kv-id`) is committed or nothing is.
    pub fn insert_batch(&self, records: Vec<NewRecord>) -> Result<Vec<u64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.transaction();
        let id_key = Counter::NextId.key();

        let mut next_id = match txn.get_for_update(id_key, true)? {
            Some(raw) => codec::decode_u64(&raw)?,
            None => return Err(Error::NotFound("counter NextId".to_string())),
        };

        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            let id = next_id;
            Self::put_record(&txn, id, record)?;
            ids.push(id);
            next_id = id
                .checked_add(1)
                .ok_or_else(|| Error::Storage("record id space exhausted".to_string()))?;
        }

        txn.put(id_key, codec::encode_u64(next_id))?;
        // Dropping an uncommitted transaction discards every write above
        txn.commit()?;

        tracing::debug!(count = ids.len(), first_id = ids[0], "Records inserted");
        Ok(ids)
    }

    fn put_record(txn: &Transaction<'_, TransactionDB>, id: u64, record: &NewRecord) -> Result<()> {
        let key = |prefix| codec::field_key(prefix, id);

        txn.put(key(FieldPrefix::Address), record.destination.as_bytes())?;
        txn.put(key(FieldPrefix::Amount), codec::encode_amount(&record.amount))?;
        txn.put(key(FieldPrefix::Nonce), codec::encode_u64(record.nonce_hint))?;
        txn.put(key(FieldPrefix::Status), codec::encode_u64(Status::Pending.code()))?;
        txn.put(key(FieldPrefix::Hash), b"")?;
        txn.put(key(FieldPrefix::Created), codec::encode_u64(record.created_at))?;
        txn.put(key(FieldPrefix::Modified), codec::encode_u64(record.created_at))?;
        Ok(())
    }

    /// Read every field of a record
    pub fn get(&self, id: u64) -> Result<DisbursementRecord> {
        let field = |prefix: FieldPrefix| -> Result<Vec<u8>> {
            self.db.get(codec::field_key(prefix, id))?.ok_or_else(|| {
                Error::NotFound(format!(
                    "record {} field {}",
                    id,
                    String::from_utf8_lossy(prefix.as_bytes())
                ))
            })
        };

        let destination = String::from_utf8(field(FieldPrefix::Address)?)
            .map_err(|e| Error::Corrupt(format!("record {} address: {}", id, e)))?;
        let amount = codec::decode_amount(&field(FieldPrefix::Amount)?);
        let nonce_hint = codec::decode_u64(&field(FieldPrefix::Nonce)?)?;
        let status = decode_status(&field(FieldPrefix::Status)?)?;
        let transaction_id = String::from_utf8(field(FieldPrefix::Hash)?)
            .map_err(|e| Error::Corrupt(format!("record {} hash: {}", id, e)))?;
        let created_at = codec::decode_u64(&field(FieldPrefix::Created)?)?;
        let modified_at = codec::decode_u64(&field(FieldPrefix::Modified)?)?;

        Ok(DisbursementRecord {
            id,
            destination,
            amount,
            nonce_hint,
            status,
            transaction_id,
            created_at,
            modified_at,
        })
    }

    /// Ids of `Pending` records in ascending order
    pub fn list_unhandled(&self) -> Result<Vec<u64>> {
        self.list_by_status(Status::Pending)
    }

    /// Ids with the given status in ascending order (fresh scan of the status index)
    pub fn list_by_status(&self, status: Status) -> Result<Vec<u64>> {
        let prefix = FieldPrefix::Status.as_bytes();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        let mut ids = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }

            if decode_status(&value)? == status {
                ids.push(codec::parse_field_key(FieldPrefix::Status, &key)?);
            }
        }

        Ok(ids)
    }

    /// Atomically move a record from `expected` to `new`
    ///
    /// Fails with [`Error::Conflict`] without writing when the stored status
    /// differs from `expected` or another transaction holds the key past the
    /// lock timeout.
    pub fn compare_and_swap_status(&self, id: u64, expected: Status, new: Status) -> Result<()> {
        if !expected.can_transition_to(new) {
            return Err(Error::InvalidTransition { from: expected, to: new });
        }

        let key = codec::field_key(FieldPrefix::Status, id);
        let txn = self.db.transaction();

        let raw = txn
            .get_for_update(&key, true)
            .map_err(|e| contention_as_conflict(e, id, expected))?
            .ok_or_else(|| Error::NotFound(format!("record {} status", id)))?;

        let actual = decode_status(&raw)?;
        if actual != expected {
            return Err(Error::Conflict {
                id,
                expected,
                actual: Some(actual),
            });
        }

        txn.put(&key, codec::encode_u64(new.code()))?;
        txn.put(
            codec::field_key(FieldPrefix::Modified, id),
            codec::encode_u64(unix_now()),
        )?;
        txn.commit()
            .map_err(|e| contention_as_conflict(e, id, expected))?;

        tracing::debug!(id, from = %expected, to = %new, "Status swapped");
        Ok(())
    }

    /// Record the broadcast transaction id of a `Claimed` record
    pub fn set_transaction_id(&self, id: u64, transaction_id: &str) -> Result<()> {
        let status_key = codec::field_key(FieldPrefix::Status, id);
        let txn = self.db.transaction();

        let raw = txn
            .get_for_update(&status_key, true)
            .map_err(|e| contention_as_conflict(e, id, Status::Claimed))?
            .ok_or_else(|| Error::NotFound(format!("record {} status", id)))?;

        let actual = decode_status(&raw)?;
        if actual != Status::Claimed {
            return Err(Error::Conflict {
                id,
                expected: Status::Claimed,
                actual: Some(actual),
            });
        }

        txn.put(codec::field_key(FieldPrefix::Hash, id), transaction_id.as_bytes())?;
        txn.put(
            codec::field_key(FieldPrefix::Modified, id),
            codec::encode_u64(unix_now()),
        )?;
        txn.commit()?;

        Ok(())
    }

    /// Close the store (graceful shutdown)
    ///
    /// `TransactionDB` has no memtable flush, so `kv-id` is rewritten with a
    /// synced write. That forces the write-ahead log, and every commit before
    /// it, onto disk before the handle is released.
    pub fn close(self) -> Result<()> {
        let next_id = self.counter(Counter::NextId)?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_opt(Counter::NextId.key(), codec::encode_u64(next_id), &write_opts)?;

        drop(self.db);
        tracing::info!(next_id, "Record store flushed and closed");
        Ok(())
    }
}

fn decode_status(raw: &[u8]) -> Result<Status> {
    let code = codec::decode_u64(raw)?;
    Status::from_code(code).ok_or_else(|| Error::Corrupt(format!("unknown status code {}", code)))
}

fn contention_as_conflict(err: rocksdb::Error, id: u64, expected: Status) -> Error {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => Error::Conflict {
            id,
            expected,
            actual: None,
        },
        _ => err.into(),
    }
}
