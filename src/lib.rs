//! # credential-cache
//!
//! Verification-result cache that deduplicates expensive "verify this
//! document for this identity" operations by content fingerprint.
//!
//! A repeated request for an already-verified (subject, document) pair is
//! answered from a persisted record instead of re-running verification.
//! Concurrent requests for the same new pair run the verification once.
//!
//! ```no_run
//! use credential_cache::{CacheConfig, VerificationOrchestrator};
//! use serde_json::json;
//!
//! # async fn run() -> credential_cache::Result<()> {
//! let orchestrator = VerificationOrchestrator::open(CacheConfig::default())?;
//! let outcome = orchestrator
//!     .verify("USER001", std::fs::read("passport.png")?, |doc| async move {
//!         // expensive OCR call goes here
//!         Ok::<_, credential_cache::BoxError>(json!({ "bytes": doc.len() }))
//!     })
//!     .await?;
//! println!("reused={} record={}", outcome.reused, outcome.record.record_id());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod orchestrator;

pub use cache::{
    fingerprint, text_similarity_key, CacheKey, CredentialRecord, CredentialStore, Fingerprint,
    LoadMode, LoadStatus, PersistentLog, RecordId, SimilarityKey,
};
pub use config::CacheConfig;
pub use error::{BoxError, Error, Result};
pub use event::{CacheEvent, CacheEventsChannel};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use orchestrator::{
    AuditReport, RequestLogEntry, VerificationOrchestrator, VerificationOutcome, VerificationStatus,
};
