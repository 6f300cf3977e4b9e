//! Single-flight behaviour under concurrent requests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{CountingVerifier, TestHarness};
use bytes::Bytes;
use credential_cache::{CacheConfig, Error, VerificationOrchestrator};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_concurrent_callers_share_one_verification() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::with_delay(Duration::from_millis(50));
    let document = Bytes::from_static(b"passport scan for USER001");

    let outcomes = join_all((0..10).map(|_| {
        harness
            .orchestrator()
            .verify("USER001", document.clone(), |doc| verifier.run(doc))
    }))
    .await;

    assert_eq!(verifier.calls(), 1);
    let outcomes: Vec<_> = outcomes.into_iter().map(|r| r.expect("verify")).collect();
    assert_eq!(outcomes.iter().filter(|o| !o.reused).count(), 1);
    assert!(outcomes.iter().all(|o| o.record == outcomes[0].record));
    assert_eq!(harness.orchestrator().store().len(), 1);
    assert_eq!(harness.orchestrator().store().in_flight(), 0);

    let snapshot = harness.orchestrator().snapshot();
    assert_eq!(snapshot.total_requests, 10);
    assert_eq!(snapshot.new_verifications, 1);
    assert_eq!(snapshot.reused_verifications, 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_callers_share_one_verification() {
    let dir = TempDir::new().expect("tempdir");
    let orchestrator = Arc::new(
        VerificationOrchestrator::open(CacheConfig::with_root_dir(dir.path())).expect("open"),
    );
    let verifier = CountingVerifier::with_delay(Duration::from_millis(30));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            let verifier = verifier.clone();
            tokio::spawn(async move {
                orchestrator
                    .verify(
                        "USER042",
                        Bytes::from_static(b"bank statement"),
                        move |doc| async move { verifier.run(doc).await },
                    )
                    .await
            })
        })
        .collect();

    let mut record_ids = Vec::new();
    for handle in handles {
        let outcome = handle.await.expect("join").expect("verify");
        record_ids.push(*outcome.record.record_id());
    }

    assert_eq!(verifier.calls(), 1);
    assert!(record_ids.iter().all(|id| *id == record_ids[0]));
    assert_eq!(orchestrator.store().len(), 1);
}

#[tokio::test]
async fn test_distinct_documents_verify_in_parallel() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::with_delay(Duration::from_millis(20));
    let documents: Vec<Vec<u8>> = (0..4u8).map(|i| vec![b'd', b'o', b'c', i]).collect();

    let outcomes = join_all(documents.iter().map(|document| {
        harness
            .orchestrator()
            .verify("USER001", document.clone(), |doc| verifier.run(doc))
    }))
    .await;

    assert_eq!(verifier.calls(), 4);
    assert!(outcomes.into_iter().all(|r| !r.expect("verify").reused));
    assert_eq!(harness.orchestrator().store().len(), 4);
}

#[tokio::test]
async fn test_cancelled_leader_does_not_block_others() {
    let harness = TestHarness::setup();
    let slow = CountingVerifier::with_delay(Duration::from_secs(30));
    let fast = CountingVerifier::new();
    let document = Bytes::from_static(b"utility bill");

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        harness
            .orchestrator()
            .verify("USER009", document.clone(), |doc| slow.run(doc)),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(harness.orchestrator().store().in_flight(), 0);
    assert!(harness.orchestrator().store().is_empty());

    let outcome = harness
        .orchestrator()
        .verify("USER009", document.clone(), |doc| fast.run(doc))
        .await
        .expect("verify after cancellation");
    assert!(!outcome.reused);
    assert_eq!(fast.calls(), 1);
}

#[tokio::test]
async fn test_failed_leader_lets_waiter_retry() {
    let harness = TestHarness::setup();
    let failing = CountingVerifier::with_delay(Duration::from_millis(30)).failing();
    let healthy = CountingVerifier::new();
    let document = Bytes::from_static(b"national id card");

    let leader = harness
        .orchestrator()
        .verify("USER010", document.clone(), |doc| failing.run(doc));
    let waiter = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        harness
            .orchestrator()
            .verify("USER010", document.clone(), |doc| healthy.run(doc))
            .await
    };

    let (leader, waiter) = tokio::join!(leader, waiter);

    assert!(matches!(leader, Err(Error::VerificationFailed { .. })));
    let waiter = waiter.expect("waiter should take over");
    assert!(!waiter.reused);
    assert_eq!(failing.calls(), 1);
    assert_eq!(healthy.calls(), 1);
    assert_eq!(harness.orchestrator().store().len(), 1);
    assert_eq!(harness.orchestrator().snapshot().total_requests, 1);
}

#[tokio::test]
async fn test_failure_then_retry_succeeds() {
    let harness = TestHarness::setup();
    let failing = CountingVerifier::new().failing();
    let healthy = CountingVerifier::new();
    let document = Bytes::from_static(b"blurry selfie");

    let err = harness
        .orchestrator()
        .verify("USER011", document.clone(), |doc| failing.run(doc))
        .await
        .expect_err("should fail");
    assert!(err.is_verification_failure());
    assert!(harness.orchestrator().store().is_empty());

    let outcome = harness
        .orchestrator()
        .verify("USER011", document, |doc| healthy.run(doc))
        .await
        .expect("retry");
    assert!(!outcome.reused);
}
