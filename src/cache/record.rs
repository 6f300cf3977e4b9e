//! Credential records and their keys.

use super::fingerprint::{hex_digest, sha256, Fingerprint};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Lookup key: one record per (subject, fingerprint) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Subject identifier.
    pub subject_id: String,
    /// Document fingerprint.
    pub fingerprint: Fingerprint,
}

impl CacheKey {
    /// Create a key.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            subject_id: subject_id.into(),
            fingerprint,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_id, self.fingerprint.short())
    }
}

/// Audit handle for a record.
///
/// SHA-256 over `"{subject_id}:{fingerprint_hex}:{created_at}"`. Because the
/// creation time is an input, it is assigned once and never recomputed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(#[serde(with = "hex_digest")] [u8; 32]);

impl RecordId {
    /// Derive the record id for the given inputs.
    #[must_use]
    pub fn derive(subject_id: &str, fingerprint: &Fingerprint, created_at: &DateTime<Utc>) -> Self {
        let label = format!(
            "{subject_id}:{}:{}",
            fingerprint.to_hex(),
            created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        );
        Self(sha256(&[label.as_bytes()]))
    }

    /// Lower-case hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 bytes in hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.short())
    }
}

impl FromStr for RecordId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Immutable result of one verification for one (subject, document) pair.
///
/// Serialized with the field names of the durable log:
/// `subjectId`, `fingerprint`, `recordId`, `payload`, `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    subject_id: String,
    fingerprint: Fingerprint,
    record_id: RecordId,
    payload: Value,
    created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create a new record stamped with the current time.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, fingerprint: Fingerprint, payload: Value) -> Self {
        Self::with_timestamp(subject_id, fingerprint, payload, Utc::now())
    }

    /// Create a record with an explicit creation time.
    #[must_use]
    pub fn with_timestamp(
        subject_id: impl Into<String>,
        fingerprint: Fingerprint,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        let subject_id = subject_id.into();
        let record_id = RecordId::derive(&subject_id, &fingerprint, &created_at);
        Self {
            subject_id,
            fingerprint,
            record_id,
            payload,
            created_at,
        }
    }

    /// Subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Document fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Audit handle.
    #[must_use]
    pub const fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Verification payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Time of first creation.
    #[must_use]
    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    /// Lookup key for this record.
    #[must_use]
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.subject_id.clone(), self.fingerprint)
    }

    /// Returns true if the stored record id still matches the stored fields.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        RecordId::derive(&self.subject_id, &self.fingerprint, &self.created_at) == self.record_id
    }
}
