//! Content fingerprints for documents.
//!
//! The cache identifies a document by the SHA-256 digest of its raw bytes.
//! Any re-encoding of the document produces a different fingerprint.
//!
//! [`SimilarityKey`] hashes normalized extracted text instead. It tolerates
//! whitespace and case noise and is never used as a cache key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Size of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// SHA-256 digest of a document's raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex_digest")] [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint the given document bytes.
    #[must_use]
    pub fn of(document: &[u8]) -> Self {
        Self(sha256(&[document]))
    }

    /// Wrap a precomputed digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
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

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Fingerprint the given document bytes.
#[must_use]
pub fn fingerprint(document: &[u8]) -> Fingerprint {
    Fingerprint::of(document)
}

/// Digest of normalized extracted text (lower-cased, whitespace collapsed).
///
/// Two documents whose extracted text differs only in case or spacing share a
/// similarity key. This is a content-similarity signal, not a document identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimilarityKey(#[serde(with = "hex_digest")] [u8; FINGERPRINT_LEN]);

impl SimilarityKey {
    /// Lower-case hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SimilarityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimilarityKey({})", hex::encode(&self.0[..8]))
    }
}

/// Compute the similarity key for extracted text.
#[must_use]
pub fn text_similarity_key(text: &str) -> SimilarityKey {
    let normalized = text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    SimilarityKey(sha256(&[normalized.as_bytes()]))
}

/// SHA-256 over the concatenation of `parts`.
pub(crate) fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let hash = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Serde helper: 32-byte digests as lower-case hex strings.
pub(crate) mod hex_digest {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}
