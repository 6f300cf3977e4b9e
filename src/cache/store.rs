//! In-memory credential index with single-flight creation.
//!
//! Records live in an insertion-ordered arena with two indexes: one by
//! (subject, fingerprint) for lookups and one by record id for audits.
//!
//! # Locking
//!
//! - `index`: read lock for lookups, write lock only for the short
//!   in-memory update after a successful disk write.
//! - `in_flight`: one entry per key whose verification is running. The
//!   leader holds the matching `watch::Sender` in a [`FlightGuard`]; dropping
//!   the guard (success, failure or cancellation) removes the entry and closes
//!   the channel, which wakes every waiter.
//! - `commit`: serializes "write log, then update index" so the file on disk
//!   always equals some state the index actually held.
//!
//! Lock order is `in_flight` before `index`, and `commit` before `index`.
//! No lock is held across an `.await`.

use super::fingerprint::Fingerprint;
use super::log::{LoadStatus, PersistentLog};
use super::record::{CacheKey, CredentialRecord, RecordId};
use crate::error::{BoxError, Error, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Index {
    records: Vec<CredentialRecord>,
    by_key: HashMap<CacheKey, usize>,
    by_record_id: HashMap<RecordId, usize>,
}

impl Index {
    fn from_records(records: Vec<CredentialRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            let key = record.key();
            if index.by_key.contains_key(&key)
                || index.by_record_id.contains_key(record.record_id())
            {
                warn!(
                    "Skipping duplicate credential {} ({}) in log",
                    key,
                    record.record_id().short()
                );
                continue;
            }
            index.push(record);
        }
        index
    }

    fn get(&self, key: &CacheKey) -> Option<&CredentialRecord> {
        self.by_key.get(key).map(|&i| &self.records[i])
    }

    fn get_by_id(&self, record_id: &RecordId) -> Option<&CredentialRecord> {
        self.by_record_id.get(record_id).map(|&i| &self.records[i])
    }

    fn push(&mut self, record: CredentialRecord) {
        let pos = self.records.len();
        self.by_key.insert(record.key(), pos);
        self.by_record_id.insert(*record.record_id(), pos);
        self.records.push(record);
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CredentialRecord> {
        let pos = self.by_key.remove(key)?;
        let record = self.records.remove(pos);
        self.by_record_id.remove(record.record_id());
        for (i, shifted) in self.records.iter().enumerate().skip(pos) {
            self.by_key.insert(shifted.key(), i);
            self.by_record_id.insert(*shifted.record_id(), i);
        }
        Some(record)
    }
}

enum Claim<'a> {
    Hit(CredentialRecord),
    Wait(watch::Receiver<()>),
    Lead(FlightGuard<'a>),
}

/// Marks a key as being computed. Dropping it releases every waiter.
struct FlightGuard<'a> {
    store: &'a CredentialStore,
    key: CacheKey,
    _done: watch::Sender<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Remove before the sender drops so a woken waiter never sees a stale entry
        self.store.in_flight.lock().remove(&self.key);
    }
}

/// Durable, deduplicating store of credential records.
///
/// Construct once with [`CredentialStore::open`], share behind an `Arc`, and
/// call [`CredentialStore::flush`] at teardown.
pub struct CredentialStore {
    index: RwLock<Index>,
    in_flight: Mutex<HashMap<CacheKey, watch::Receiver<()>>>,
    commit: Mutex<()>,
    log: PersistentLog,
    load_status: LoadStatus,
}

impl CredentialStore {
    /// Open the store, loading every record from `log`.
    ///
    /// A corrupt log is recovered as an empty store unless the log is in
    /// strict mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read, or is corrupt
    /// in strict mode.
    pub fn open(log: PersistentLog) -> Result<Self> {
        let (records, load_status) = log.load_all()?;
        let index = Index::from_records(records);

        info!(
            "Credential store opened ({} records, log={})",
            index.records.len(),
            log.path().display()
        );

        Ok(Self {
            index: RwLock::new(index),
            in_flight: Mutex::new(HashMap::new()),
            commit: Mutex::new(()),
            log,
            load_status,
        })
    }

    /// How the durable log was loaded at startup.
    #[must_use]
    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// The backing log.
    #[must_use]
    pub fn log(&self) -> &PersistentLog {
        &self.log
    }

    /// Look up the record for `(subject_id, fingerprint)`.
    #[must_use]
    pub fn lookup(&self, subject_id: &str, fingerprint: &Fingerprint) -> Option<CredentialRecord> {
        let key = CacheKey::new(subject_id, *fingerprint);
        self.index.read().get(&key).cloned()
    }

    /// Look up a record by its audit handle.
    #[must_use]
    pub fn audit(&self, record_id: &RecordId) -> Option<CredentialRecord> {
        self.index.read().get_by_id(record_id).cloned()
    }

    /// Return the record for the key, computing and persisting it on a miss.
    ///
    /// At most one `compute` runs per key at a time. Concurrent callers for
    /// the same key wait for the running one and then return its record as a
    /// hit. If the running computation fails or is cancelled, the waiters
    /// retry and one of them runs its own `compute`.
    ///
    /// Returns the record and `true` if it already existed.
    ///
    /// # Errors
    ///
    /// - [`Error::VerificationFailed`] if `compute` fails; no record is created.
    /// - [`Error::StorageWriteFailed`] if the record cannot be persisted; the
    ///   record is not committed.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        subject_id: &str,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<(CredentialRecord, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: Into<BoxError>,
    {
        let key = CacheKey::new(subject_id, fingerprint);

        let guard = loop {
            match self.claim(&key) {
                Claim::Hit(record) => return Ok((record, true)),
                Claim::Wait(mut done) => {
                    debug!("Waiting on in-flight verification for {}", key);
                    // Resolves once the leader's guard drops
                    let _ = done.changed().await;
                }
                Claim::Lead(guard) => break guard,
            }
        };

        debug!("Running verification for {}", key);
        let payload = compute().await.map_err(|e| Error::VerificationFailed {
            subject_id: key.subject_id.clone(),
            source: e.into(),
        })?;

        let record = CredentialRecord::new(key.subject_id.clone(), key.fingerprint, payload);
        self.commit(record.clone())?;
        drop(guard);

        Ok((record, false))
    }

    fn claim(&self, key: &CacheKey) -> Claim<'_> {
        let mut in_flight = self.in_flight.lock();

        let existing = self.index.read().get(key).cloned();
        if let Some(record) = existing {
            return Claim::Hit(record);
        }
        if let Some(done) = in_flight.get(key) {
            return Claim::Wait(done.clone());
        }

        let (tx, rx) = watch::channel(());
        in_flight.insert(key.clone(), rx);
        Claim::Lead(FlightGuard {
            store: self,
            key: key.clone(),
            _done: tx,
        })
    }

    /// Persist the set with `record` added, then make it visible.
    fn commit(&self, record: CredentialRecord) -> Result<()> {
        let _commit = self.commit.lock();
        {
            // Index writers also hold `commit`, so the set cannot change here
            let index = self.index.read();
            self.log
                .persist_all(index.records.iter().chain(std::iter::once(&record)))?;
        }
        debug!(
            "Committed credential {} for {}",
            record.record_id().short(),
            record.key()
        );
        self.index.write().push(record);
        Ok(())
    }

    /// Remove the record for `(subject_id, fingerprint)`.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWriteFailed`] if the log cannot be rewritten;
    /// the record then stays in place.
    pub fn evict(&self, subject_id: &str, fingerprint: &Fingerprint) -> Result<bool> {
        let key = CacheKey::new(subject_id, *fingerprint);
        let _commit = self.commit.lock();
        {
            let index = self.index.read();
            if index.get(&key).is_none() {
                return Ok(false);
            }
            self.log.persist_all(
                index
                    .records
                    .iter()
                    .filter(|r| !(r.subject_id() == subject_id && r.fingerprint() == fingerprint)),
            )?;
        }
        let removed = self.index.write().remove(&key);
        if let Some(record) = removed {
            info!("Evicted credential {} for {}", record.record_id().short(), key);
        }
        Ok(true)
    }

    /// Rewrite the durable log from memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWriteFailed`] if the log cannot be written.
    pub fn flush(&self) -> Result<()> {
        let _commit = self.commit.lock();
        let index = self.index.read();
        self.log.persist_all(&index.records)
    }

    /// Clone of every record, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<CredentialRecord> {
        self.index.read().records.clone()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().records.len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently being computed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
