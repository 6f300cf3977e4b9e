//! Cache event system.

use tokio::sync::broadcast;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events emitted by the verification orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A new verification ran and its record was stored.
    Verified {
        /// Subject identifier.
        subject_id: String,
        /// Record id (hex).
        record_id: String,
    },

    /// A request was answered from an existing record.
    Reused {
        /// Subject identifier.
        subject_id: String,
        /// Record id (hex).
        record_id: String,
    },

    /// Verification or persistence failed.
    Failed {
        /// Subject identifier.
        subject_id: String,
        /// Error message.
        message: String,
    },

    /// A record was evicted.
    Evicted {
        /// Subject identifier.
        subject_id: String,
        /// Record id (hex).
        record_id: String,
    },

    /// An audit lookup was performed.
    Audited {
        /// Record id (hex) that was audited.
        record_id: String,
        /// Whether the record exists and its label is intact.
        valid: bool,
    },

    /// Orchestrator is shutting down.
    ShuttingDown,
}

/// Channel for receiving cache events.
pub type CacheEventsChannel = broadcast::Receiver<CacheEvent>;

/// Sender for cache events.
pub type CacheEventsSender = broadcast::Sender<CacheEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel(capacity: usize) -> (CacheEventsSender, CacheEventsChannel) {
    broadcast::channel(capacity.max(1))
}
