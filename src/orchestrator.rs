//! Verification orchestrator combining the credential store and metrics.
//!
//! This is the public entry point: it fingerprints a document, answers from
//! the store when possible and otherwise runs the caller's verification
//! callback exactly once for that (subject, document) pair.

use crate::cache::{
    fingerprint, CredentialRecord, CredentialStore, Fingerprint, LoadMode, LoadStatus,
    PersistentLog, RecordId,
};
use crate::config::CacheConfig;
use crate::error::{BoxError, Error, Result};
use crate::event::{create_event_channel, CacheEvent, CacheEventsChannel, CacheEventsSender};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a verification request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The callback ran and a new record was stored.
    New,
    /// Answered from an existing record.
    Reused,
}

impl VerificationStatus {
    /// Returns true if the request avoided running the callback.
    #[must_use]
    pub fn is_reused(&self) -> bool {
        matches!(self, Self::Reused)
    }
}

/// Result of [`VerificationOrchestrator::verify`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    /// True if the record already existed.
    pub reused: bool,
    /// The existing or freshly created record.
    pub record: CredentialRecord,
    /// Wall time of the request.
    pub latency: Duration,
}

impl VerificationOutcome {
    /// Request status.
    #[must_use]
    pub fn status(&self) -> VerificationStatus {
        if self.reused {
            VerificationStatus::Reused
        } else {
            VerificationStatus::New
        }
    }

    /// Latency in milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Result of [`VerificationOrchestrator::audit`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    /// True if the record exists and its id matches its fields.
    pub valid: bool,
    /// The record, if one exists under the audited id.
    pub record: Option<CredentialRecord>,
    /// Wall time of the lookup.
    pub latency: Duration,
}

/// One entry in the request history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    /// 1-based request number since the orchestrator was opened.
    pub request_num: u64,
    /// Subject identifier.
    pub subject_id: String,
    /// Document fingerprint.
    pub fingerprint: Fingerprint,
    /// How the request was answered.
    pub status: VerificationStatus,
    /// Wall time of the request.
    pub latency: Duration,
    /// Record that answered the request.
    pub record_id: RecordId,
}

#[derive(Debug)]
struct History {
    entries: VecDeque<RequestLogEntry>,
    capacity: usize,
    next_request: u64,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_request: 1,
        }
    }

    fn push(&mut self, outcome: &VerificationOutcome) {
        let entry = RequestLogEntry {
            request_num: self.next_request,
            subject_id: outcome.record.subject_id().to_string(),
            fingerprint: *outcome.record.fingerprint(),
            status: outcome.status(),
            latency: outcome.latency,
            record_id: *outcome.record.record_id(),
        };
        self.next_request += 1;
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Deduplicating front end for an expensive verification step.
///
/// Combines:
/// 1. The credential store for lookups and single-flight creation
/// 2. The metrics aggregator for reuse and latency statistics
/// 3. An event channel and a bounded request history for observers
pub struct VerificationOrchestrator {
    store: CredentialStore,
    metrics: MetricsAggregator,
    history: Mutex<History>,
    events_tx: CacheEventsSender,
    config: CacheConfig,
}

impl VerificationOrchestrator {
    /// Open the orchestrator, loading the credential log named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created or the log
    /// cannot be loaded (see [`CredentialStore::open`]).
    pub fn open(config: CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root_dir)?;

        let mode = if config.strict_load {
            LoadMode::Strict
        } else {
            LoadMode::Recover
        };
        let store = CredentialStore::open(PersistentLog::new(config.log_path()).with_mode(mode))?;
        let (events_tx, _) = create_event_channel(config.event_channel_capacity);

        info!(
            "Verification orchestrator initialized (records={}, history={}, strict_load={})",
            store.len(),
            config.history_capacity,
            config.strict_load
        );

        Ok(Self {
            history: Mutex::new(History::new(config.history_capacity)),
            metrics: MetricsAggregator::new(),
            store,
            events_tx,
            config,
        })
    }

    /// Verify `document` for `subject_id`, reusing an existing record if one exists.
    ///
    /// `compute` runs only on a miss, receives the document bytes and returns
    /// the structured verification payload.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSubject`] if `subject_id` is empty.
    /// - [`Error::VerificationFailed`] if `compute` fails.
    /// - [`Error::StorageWriteFailed`] if the new record cannot be persisted.
    pub async fn verify<F, Fut, E>(
        &self,
        subject_id: &str,
        document: impl Into<Bytes>,
        compute: F,
    ) -> Result<VerificationOutcome>
    where
        F: FnOnce(Bytes) -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: Into<BoxError>,
    {
        if subject_id.is_empty() {
            return Err(Error::InvalidSubject);
        }

        let started = Instant::now();
        let document = document.into();
        let fingerprint = fingerprint(&document);

        let result = self
            .store
            .get_or_create(subject_id, fingerprint, move || compute(document))
            .await;
        let latency = started.elapsed();

        let (record, reused) = match result {
            Ok(found) => found,
            Err(e) => {
                warn!("Verification for {} ({}) failed: {}", subject_id, fingerprint.short(), e);
                let _ = self.events_tx.send(CacheEvent::Failed {
                    subject_id: subject_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let outcome = VerificationOutcome {
            reused,
            record,
            latency,
        };
        self.observe(&outcome);
        Ok(outcome)
    }

    fn observe(&self, outcome: &VerificationOutcome) {
        let subject_id = outcome.record.subject_id().to_string();
        let record_id = outcome.record.record_id().to_hex();

        if outcome.reused {
            self.metrics.record_reuse(outcome.latency);
            debug!(
                "Credential {} reused for {} in {:.2}ms",
                outcome.record.record_id().short(),
                subject_id,
                outcome.latency_ms()
            );
            let _ = self.events_tx.send(CacheEvent::Reused { subject_id, record_id });
        } else {
            self.metrics.record_new(outcome.latency);
            info!(
                "New credential {} created for {} in {:.2}ms",
                outcome.record.record_id().short(),
                subject_id,
                outcome.latency_ms()
            );
            let _ = self.events_tx.send(CacheEvent::Verified { subject_id, record_id });
        }

        self.history.lock().push(outcome);
    }

    /// Evict any record for `(subject_id, document)` and verify again.
    ///
    /// # Errors
    ///
    /// As [`VerificationOrchestrator::verify`], plus any eviction error.
    pub async fn refresh<F, Fut, E>(
        &self,
        subject_id: &str,
        document: impl Into<Bytes>,
        compute: F,
    ) -> Result<VerificationOutcome>
    where
        F: FnOnce(Bytes) -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: Into<BoxError>,
    {
        let document = document.into();
        self.evict(subject_id, &document)?;
        self.verify(subject_id, document, compute).await
    }

    /// Remove the record for `(subject_id, document)`.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be rewritten.
    pub fn evict(&self, subject_id: &str, document: &[u8]) -> Result<bool> {
        self.evict_fingerprint(subject_id, &fingerprint(document))
    }

    /// Remove the record for `(subject_id, fingerprint)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be rewritten.
    pub fn evict_fingerprint(&self, subject_id: &str, fingerprint: &Fingerprint) -> Result<bool> {
        let Some(existing) = self.store.lookup(subject_id, fingerprint) else {
            return Ok(false);
        };
        let removed = self.store.evict(subject_id, fingerprint)?;
        if removed {
            let _ = self.events_tx.send(CacheEvent::Evicted {
                subject_id: subject_id.to_string(),
                record_id: existing.record_id().to_hex(),
            });
        }
        Ok(removed)
    }

    /// Look up a record by its audit handle without re-verifying anything.
    pub fn audit(&self, record_id: &RecordId) -> AuditReport {
        let started = Instant::now();
        let record = self.store.audit(record_id);
        let valid = record.as_ref().is_some_and(CredentialRecord::is_intact);
        let latency = started.elapsed();

        self.metrics.record_audit(latency);
        if record.is_some() && !valid {
            warn!("Credential {} failed integrity check", record_id.short());
        }
        let _ = self.events_tx.send(CacheEvent::Audited {
            record_id: record_id.to_hex(),
            valid,
        });

        AuditReport {
            valid,
            record,
            latency,
        }
    }

    /// Current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.store.len())
    }

    /// Most recent requests, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<RequestLogEntry> {
        self.history.lock().entries.iter().cloned().collect()
    }

    /// Subscribe to cache events.
    #[must_use]
    pub fn subscribe_events(&self) -> CacheEventsChannel {
        self.events_tx.subscribe()
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// How the credential log was loaded.
    #[must_use]
    pub fn load_status(&self) -> &LoadStatus {
        self.store.load_status()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Flush the store to disk and announce shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn shutdown(&self) -> Result<()> {
        let _ = self.events_tx.send(CacheEvent::ShuttingDown);
        self.store.flush()?;
        info!("Verification orchestrator shut down ({} records)", self.store.len());
        Ok(())
    }
}
