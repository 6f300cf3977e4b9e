//! End-to-end tests for credential-cache.
//!
//! Each test drives a [`VerificationOrchestrator`] backed by a temporary
//! directory, with a fake verification step that counts its invocations.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test e2e
//! cargo test --test e2e concurrency
//! ```
//!
//! [`VerificationOrchestrator`]: credential_cache::VerificationOrchestrator

mod concurrency;
mod dedup;
mod metrics;

pub use harness::{CountingVerifier, TestHarness};
