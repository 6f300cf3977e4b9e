//! Reuse and latency metrics across realistic request sequences.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use super::{CountingVerifier, TestHarness};
use credential_cache::{MetricsSnapshot, VerificationStatus};
use rand::Rng;
use std::time::Duration;

#[tokio::test]
async fn test_ten_requests_over_four_documents() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::new();
    let order = ["A", "B", "C", "A", "B", "D", "A", "C", "D", "A"];

    for name in order {
        let document = format!("document {name}").into_bytes();
        harness
            .orchestrator()
            .verify("USER001", document, |doc| verifier.run(doc))
            .await
            .expect("verify");
    }

    let statuses: Vec<_> = harness
        .orchestrator()
        .history()
        .iter()
        .map(|entry| entry.status.is_reused())
        .collect();
    assert_eq!(
        statuses,
        [false, false, false, true, true, false, true, true, true, true]
    );

    let snapshot = harness.orchestrator().snapshot();
    assert_eq!(snapshot.total_requests, 10);
    assert_eq!(snapshot.new_verifications, 4);
    assert_eq!(snapshot.reused_verifications, 6);
    assert_eq!(snapshot.reuse_rate_pct, 60.0);
    assert_eq!(snapshot.baseline_cycles, 10);
    assert_eq!(snapshot.cached_cycles, 4);
    assert_eq!(snapshot.cycles_eliminated, 6);
    assert_eq!(snapshot.cycle_reduction_pct, 60.0);
    assert_eq!(snapshot.unique_records, 4);
    assert_eq!(snapshot.storage_efficiency_pct, 40.0);
    assert_eq!(verifier.calls(), 4);
}

#[tokio::test]
async fn test_fresh_orchestrator_reports_zeros() {
    let harness = TestHarness::setup();
    assert_eq!(harness.orchestrator().snapshot(), MetricsSnapshot::default());
}

#[tokio::test]
async fn test_reuse_is_faster_than_verification() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::with_delay(Duration::from_millis(25));
    let documents: Vec<Vec<u8>> = {
        let mut rng = rand::thread_rng();
        (0..3)
            .map(|_| (0..64).map(|_| rng.gen::<u8>()).collect())
            .collect()
    };

    for round in 0..3 {
        for document in &documents {
            let outcome = harness
                .orchestrator()
                .verify("USER005", document.clone(), |doc| verifier.run(doc))
                .await
                .expect("verify");
            let expected = if round == 0 {
                VerificationStatus::New
            } else {
                VerificationStatus::Reused
            };
            assert_eq!(outcome.status(), expected);
        }
    }

    let snapshot = harness.orchestrator().snapshot();
    assert_eq!(snapshot.new_verifications, 3);
    assert_eq!(snapshot.reused_verifications, 6);
    assert!(snapshot.avg_new_latency_ms >= 25.0);
    assert!(snapshot.avg_reuse_latency_ms < snapshot.avg_new_latency_ms);
    assert!(snapshot.latency_reduction_ms > 0.0);
    assert!(snapshot.latency_reduction_pct > 0.0 && snapshot.latency_reduction_pct <= 100.0);
}

#[tokio::test]
async fn test_audits_are_tracked_separately() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::with_delay(Duration::from_millis(10));

    let outcome = harness
        .orchestrator()
        .verify("USER006", b"tax return 2023".to_vec(), |doc| verifier.run(doc))
        .await
        .expect("verify");
    let report = harness.orchestrator().audit(outcome.record.record_id());
    assert!(report.valid);

    let snapshot = harness.orchestrator().snapshot();
    assert_eq!(snapshot.total_requests, 1);
    assert_eq!(snapshot.audits, 1);
    assert!(snapshot.avg_audit_latency_ms < snapshot.avg_new_latency_ms);
    assert!(snapshot.audit_speedup >= 0.0);
}
