//! Content-addressed credential cache.
//!
//! # Architecture
//!
//! ```text
//! verify(subject, document)
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ SHA-256 fingerprint │
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Index lookup        │
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!   HIT          MISS
//!    │             │
//!    ▼             ▼
//! Reuse      Key in flight?
//!                  │
//!           ┌──────┴──────┐
//!           │             │
//!          YES            NO
//!           │             │
//!           ▼             ▼
//!      Wait, retry   Run verification
//!                         │
//!                         ▼
//!                  Persist log, index
//! ```

pub mod fingerprint;
mod log;
mod record;
mod store;

pub use fingerprint::{fingerprint, text_similarity_key, Fingerprint, SimilarityKey};
pub use log::{LoadMode, LoadStatus, PersistentLog};
pub use record::{CacheKey, CredentialRecord, RecordId};
pub use store::CredentialStore;
