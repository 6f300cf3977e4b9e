//! Deduplication by subject and document fingerprint.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{CountingVerifier, TestHarness};
use bytes::Bytes;
use credential_cache::{fingerprint, VerificationStatus};
use proptest::prelude::*;

#[tokio::test]
async fn test_repeat_requests_reuse_one_record() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::new();
    let document = Bytes::from_static(b"PASSPORT NO X1234567 SURNAME DOE");

    let mut record_ids = Vec::new();
    for _ in 0..5 {
        let outcome = harness
            .orchestrator()
            .verify("USER001", document.clone(), |doc| verifier.run(doc))
            .await
            .expect("verify");
        record_ids.push(*outcome.record.record_id());
    }

    assert_eq!(verifier.calls(), 1);
    assert!(record_ids.iter().all(|id| *id == record_ids[0]));
    assert_eq!(harness.orchestrator().store().len(), 1);

    let statuses: Vec<_> = harness
        .orchestrator()
        .history()
        .iter()
        .map(|entry| entry.status)
        .collect();
    assert_eq!(statuses[0], VerificationStatus::New);
    assert!(statuses[1..].iter().all(VerificationStatus::is_reused));
}

#[tokio::test]
async fn test_one_byte_difference_is_a_new_document() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::new();

    let a = harness
        .orchestrator()
        .verify("USER001", b"Invoice #INV123".to_vec(), |doc| verifier.run(doc))
        .await
        .expect("verify a");
    let b = harness
        .orchestrator()
        .verify("USER001", b"Invoice #INV124".to_vec(), |doc| verifier.run(doc))
        .await
        .expect("verify b");

    assert!(!a.reused);
    assert!(!b.reused);
    assert_eq!(verifier.calls(), 2);
    assert_ne!(a.record.fingerprint(), b.record.fingerprint());
    assert_ne!(a.record.record_id(), b.record.record_id());
}

#[tokio::test]
async fn test_same_document_different_subjects_are_distinct() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::new();
    let document = Bytes::from_static(b"shared utility bill");

    let alice = harness
        .orchestrator()
        .verify("USER001", document.clone(), |doc| verifier.run(doc))
        .await
        .expect("verify alice");
    let bob = harness
        .orchestrator()
        .verify("USER002", document.clone(), |doc| verifier.run(doc))
        .await
        .expect("verify bob");

    assert!(!bob.reused);
    assert_eq!(verifier.calls(), 2);
    assert_eq!(alice.record.fingerprint(), bob.record.fingerprint());
    assert_ne!(alice.record.record_id(), bob.record.record_id());
    assert_eq!(alice.record.subject_id(), "USER001");
    assert_eq!(bob.record.subject_id(), "USER002");
}

#[tokio::test]
async fn test_evicted_pair_is_verified_again() {
    let harness = TestHarness::setup();
    let verifier = CountingVerifier::new();
    let document = Bytes::from_static(b"driver licence");

    let first = harness
        .orchestrator()
        .verify("USER003", document.clone(), |doc| verifier.run(doc))
        .await
        .expect("verify");
    assert!(harness
        .orchestrator()
        .evict("USER003", &document)
        .expect("evict"));
    assert!(harness
        .orchestrator()
        .store()
        .lookup("USER003", &fingerprint(&document))
        .is_none());

    let second = harness
        .orchestrator()
        .verify("USER003", document.clone(), |doc| verifier.run(doc))
        .await
        .expect("verify again");

    assert!(!second.reused);
    assert_eq!(verifier.calls(), 2);
    assert!(!harness.orchestrator().audit(first.record.record_id()).valid);
    assert!(harness.orchestrator().audit(second.record.record_id()).valid);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_second_request_always_reuses(
        subject in "[A-Z]{4}[0-9]{3}",
        document in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let harness = TestHarness::setup();
        let verifier = CountingVerifier::new();

        let (first, second) = tokio_test::block_on(async {
            let first = harness
                .orchestrator()
                .verify(&subject, document.clone(), |doc| verifier.run(doc))
                .await
                .expect("first");
            let second = harness
                .orchestrator()
                .verify(&subject, document.clone(), |doc| verifier.run(doc))
                .await
                .expect("second");
            (first, second)
        });

        prop_assert!(!first.reused);
        prop_assert!(second.reused);
        prop_assert_eq!(verifier.calls(), 1);
        prop_assert_eq!(first.record, second.record);
    }
}
