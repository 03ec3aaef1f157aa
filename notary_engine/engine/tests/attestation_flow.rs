mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use notary_engine::ledger::SimulatedLedger;
use notary_engine::workflow::StatusCategory;
use notary_engine::{Collaborators, DocumentId, EngineConfig, FileHandle, Stage, Surface, Verdict, WorkflowError};

use common::{OTHER, REQUIRED, harness, identity};

const HELLO_WORLD_NL: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

fn hello(name: &str) -> FileHandle {
    FileHandle::from_bytes(name, b"hello world\n".to_vec())
}

#[tokio::test]
async fn test_certify_then_verify_round_trip() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();

    attestation.connect().await.unwrap();
    let fingerprint = attestation.select_file(hello("report.txt")).await.unwrap();
    assert_eq!(fingerprint.as_str(), HELLO_WORLD_NL);

    let certification = attestation.submit().await.unwrap();
    assert_eq!(certification.fingerprint, fingerprint);
    assert_eq!(certification.receipt.document_id, Some(DocumentId(1)));

    let path = certification.storage_path.as_str();
    assert!(path.starts_with("ArchivosCertificados/archivo_"), "{path}");
    assert!(path.ends_with(".txt"), "{path}");

    let stored = h.ledger.inner.document(DocumentId(1)).unwrap();
    assert_eq!(stored.fingerprint, HELLO_WORLD_NL);
    assert_eq!(stored.storage_path, path);
    assert_eq!(stored.owner, identity(REQUIRED));

    // The file is released, the fingerprint stays for copying
    let snapshot = attestation.snapshot();
    assert!(matches!(snapshot.stage, Stage::Confirmed(_)));
    assert!(snapshot.file.is_none());
    assert_eq!(snapshot.fingerprint, Some(fingerprint));
    assert_eq!(snapshot.status.unwrap().category, StatusCategory::Success);

    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("report-copy.txt")).await.unwrap();
    let comparison = verification.verify("1").await.unwrap();

    assert_eq!(comparison.verdict, Verdict::Match);
    assert_eq!(comparison.ledger, HELLO_WORLD_NL);
    assert!(matches!(verification.stage(), Stage::Compared(_)));
}

#[tokio::test]
async fn test_altered_document_is_a_mismatch() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();
    attestation.connect().await.unwrap();
    attestation
        .select_file(FileHandle::from_bytes("a.txt", b"hello world".to_vec()))
        .await
        .unwrap();
    attestation.submit().await.unwrap();

    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("a.txt")).await.unwrap();
    let comparison = verification.verify(" 1 ").await.unwrap();

    assert_eq!(comparison.verdict, Verdict::Mismatch);
    assert!(!comparison.is_match());
    assert_eq!(comparison.local.as_str(), HELLO_WORLD_NL);

    let snapshot = verification.snapshot();
    assert!(matches!(snapshot.stage, Stage::Compared(_)));
    assert_eq!(snapshot.status.unwrap().category, StatusCategory::Warning);
    assert_eq!(snapshot.ledger_fingerprint.as_deref(), Some(comparison.ledger.as_str()));
}

#[tokio::test]
async fn test_comparison_ignores_hex_case() {
    let h = harness(REQUIRED);
    let id = {
        use notary_engine::ledger::LedgerContract;
        let tx = h
            .ledger
            .inner
            .set_document(&identity(REQUIRED), &HELLO_WORLD_NL.to_uppercase(), "ArchivosCertificados/archivo_1.txt")
            .await
            .unwrap();
        h.ledger.inner.wait_for_confirmation(&tx).await.unwrap().document_id.unwrap()
    };

    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("a.txt")).await.unwrap();

    let comparison = verification.verify(&id.to_string()).await.unwrap();
    assert_eq!(comparison.verdict, Verdict::Match);
}

#[tokio::test]
async fn test_verification_rejects_other_identity() {
    let h = harness(OTHER);
    let verification = h.surface.verification();

    let err = verification.connect().await.unwrap_err();
    assert!(matches!(err, WorkflowError::WrongIdentity { .. }));

    verification.select_file(hello("a.txt")).await.unwrap();
    let err = verification.verify("1").await.unwrap_err();

    assert_eq!(err, WorkflowError::NotConnected);
    assert_eq!(h.ledger.calls(), 0);
    assert!(verification.snapshot().identity.is_none());
}

#[tokio::test]
async fn test_account_switch_revokes_restricted_exchange() {
    let h = harness(REQUIRED);
    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("a.txt")).await.unwrap();

    let mut watch = h.surface.watch_identity();
    h.wallet.switch_account(identity(OTHER));
    watch.changed().await.unwrap();
    assert_eq!(h.surface.identity(), Some(identity(OTHER)));

    let err = verification.verify("1").await.unwrap_err();
    assert!(matches!(err, WorkflowError::WrongIdentity { .. }));
    assert_eq!(h.ledger.calls(), 0);
    assert!(matches!(verification.stage(), Stage::Failed(WorkflowError::WrongIdentity { .. })));
}

#[tokio::test]
async fn test_unrestricted_verification_accepts_anyone() {
    let config = EngineConfig {
        required_identity: None,
        ..EngineConfig::default()
    };
    let h = common::harness_with(config, OTHER);
    let verification = h.surface.verification();

    assert_eq!(verification.connect().await.unwrap(), identity(OTHER));
}

#[tokio::test]
async fn test_attestation_preconditions_in_order() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();

    assert_eq!(attestation.submit().await.unwrap_err(), WorkflowError::NoFileSelected);

    attestation.select_file(hello("a.txt")).await.unwrap();
    assert_eq!(attestation.submit().await.unwrap_err(), WorkflowError::NotConnected);
    assert_eq!(h.ledger.calls(), 0);
}

#[tokio::test]
async fn test_document_id_is_validated_before_the_ledger() {
    let h = harness(REQUIRED);
    let verification = h.surface.verification();

    assert_eq!(verification.verify("1").await.unwrap_err(), WorkflowError::NoFileSelected);

    verification.select_file(hello("a.txt")).await.unwrap();
    assert_eq!(verification.verify("  ").await.unwrap_err(), WorkflowError::MissingDocumentId);
    assert!(matches!(verification.verify("abc").await, Err(WorkflowError::InvalidDocumentId(_))));
    assert!(matches!(verification.verify("0").await, Err(WorkflowError::InvalidDocumentId(_))));
    assert!(matches!(verification.verify("-3").await, Err(WorkflowError::InvalidDocumentId(_))));
    assert_eq!(verification.verify("1").await.unwrap_err(), WorkflowError::NotConnected);
    assert_eq!(h.ledger.calls(), 0);
}

#[tokio::test]
async fn test_unknown_document_id_fails_the_exchange() {
    let h = harness(REQUIRED);
    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("a.txt")).await.unwrap();

    let err = verification.verify("42").await.unwrap_err();
    assert!(matches!(err, WorkflowError::LedgerCall(_)));
    assert!(matches!(verification.stage(), Stage::Failed(WorkflowError::LedgerCall(_))));
}

#[tokio::test]
async fn test_rejected_write_keeps_the_selection() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();
    attestation.connect().await.unwrap();
    attestation.select_file(hello("a.txt")).await.unwrap();

    h.ledger.inner.fail_writes(Some("user denied transaction signature"));
    let err = attestation.submit().await.unwrap_err();
    match &err {
        WorkflowError::LedgerCall(message) => assert!(message.contains("user denied transaction signature")),
        other => panic!("unexpected error: {other:?}"),
    }

    let snapshot = attestation.snapshot();
    assert!(matches!(snapshot.stage, Stage::Failed(WorkflowError::LedgerCall(_))));
    assert!(snapshot.file.is_some());
    assert_eq!(h.ledger.inner.document_count(), 0);

    // Retry once the user accepts
    h.ledger.inner.fail_writes(None);
    attestation.submit().await.unwrap();
    assert_eq!(h.ledger.inner.document_count(), 1);
}

#[tokio::test]
async fn test_missing_provider_fails_every_stage() {
    let (surface, _listener) = Surface::open(
        EngineConfig::default(),
        Collaborators {
            provider: None,
            ledger: Arc::new(SimulatedLedger::new("0x76b554b49c60C673B428A4F5331727e5138C0Ba7")),
            clipboard: None,
        },
    );
    let attestation = surface.attestation();
    let verification = surface.verification();

    let err = attestation.select_file(hello("a.txt")).await.unwrap_err();
    assert_eq!(err, WorkflowError::ProviderAbsent);
    assert!(err.is_fatal());
    assert!(attestation.snapshot().file.is_none());

    assert_eq!(attestation.connect().await.unwrap_err(), WorkflowError::ProviderAbsent);
    assert_eq!(attestation.submit().await.unwrap_err(), WorkflowError::ProviderAbsent);
    assert_eq!(verification.verify("1").await.unwrap_err(), WorkflowError::ProviderAbsent);
    assert_eq!(surface.connect().await.unwrap_err(), WorkflowError::ProviderAbsent);
    assert!(matches!(attestation.stage(), Stage::Failed(WorkflowError::ProviderAbsent)));
}

#[tokio::test]
async fn test_newer_selection_supersedes_hashing() {
    let h = harness(REQUIRED);
    let workflow = h.surface.attestation();

    let (mut writer, reader) = tokio::io::duplex(64);
    let slow = FileHandle::from_reader("slow.bin", 1024, reader);
    let first = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.select_file(slow).await })
    };
    while workflow.stage() != Stage::Hashing {
        tokio::task::yield_now().await;
    }

    let second = workflow.select_file(hello("b.txt")).await.unwrap();

    writer.write_all(&[0u8; 16]).await.unwrap();
    drop(writer);
    assert_eq!(first.await.unwrap(), Err(WorkflowError::Superseded));

    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.stage, Stage::HashReady);
    assert_eq!(snapshot.fingerprint, Some(second));
    assert_eq!(snapshot.file.unwrap().name, "b.txt");
}

#[tokio::test]
async fn test_clear_discards_in_flight_hashing() {
    let h = harness(REQUIRED);
    let workflow = h.surface.attestation();

    let (writer, reader) = tokio::io::duplex(64);
    let slow = FileHandle::from_reader("slow.bin", 1024, reader);
    let pending = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.select_file(slow).await })
    };
    while workflow.stage() != Stage::Hashing {
        tokio::task::yield_now().await;
    }

    workflow.clear();
    drop(writer);

    assert_eq!(pending.await.unwrap(), Err(WorkflowError::Superseded));
    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.stage, Stage::Idle);
    assert!(snapshot.file.is_none());
    assert!(snapshot.fingerprint.is_none());
}

#[tokio::test]
async fn test_one_exchange_at_a_time() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();
    attestation.connect().await.unwrap();
    attestation.select_file(hello("a.txt")).await.unwrap();
    attestation.submit().await.unwrap();

    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("a.txt")).await.unwrap();

    h.ledger.hold_reads.store(true, Ordering::SeqCst);
    let in_flight = {
        let verification = verification.clone();
        tokio::spawn(async move { verification.verify("1").await })
    };
    while verification.stage() != Stage::Fetching {
        tokio::task::yield_now().await;
    }

    assert_eq!(verification.verify("1").await.unwrap_err(), WorkflowError::ExchangeInProgress);
    assert_eq!(verification.stage(), Stage::Fetching);

    h.ledger.release.notify_one();
    let comparison = in_flight.await.unwrap().unwrap();
    assert_eq!(comparison.verdict, Verdict::Match);
    assert_eq!(h.ledger.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reselection_during_fetch_drops_the_comparison() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();
    attestation.connect().await.unwrap();
    attestation.select_file(hello("a.txt")).await.unwrap();
    attestation.submit().await.unwrap();

    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    verification.select_file(hello("a.txt")).await.unwrap();

    h.ledger.hold_reads.store(true, Ordering::SeqCst);
    let in_flight = {
        let verification = verification.clone();
        tokio::spawn(async move { verification.verify("1").await })
    };
    while verification.stage() != Stage::Fetching {
        tokio::task::yield_now().await;
    }

    let replacement = verification
        .select_file(FileHandle::from_bytes("b.txt", b"another document".to_vec()))
        .await
        .unwrap();
    h.ledger.release.notify_one();

    assert_eq!(in_flight.await.unwrap(), Err(WorkflowError::Superseded));
    let snapshot = verification.snapshot();
    assert_eq!(snapshot.stage, Stage::HashReady);
    assert_eq!(snapshot.fingerprint, Some(replacement));
    assert!(snapshot.ledger_fingerprint.is_none());
}

#[tokio::test]
async fn test_abandoned_fetch_settles_the_stage() {
    let h = harness(REQUIRED);
    let attestation = h.surface.attestation();
    attestation.connect().await.unwrap();
    attestation.select_file(hello("a.txt")).await.unwrap();
    attestation.submit().await.unwrap();

    let verification = h.surface.verification();
    verification.connect().await.unwrap();
    let fingerprint = verification.select_file(hello("a.txt")).await.unwrap();

    h.ledger.hold_reads.store(true, Ordering::SeqCst);
    let abandoned = tokio::time::timeout(Duration::from_millis(50), verification.verify("1")).await;
    assert!(abandoned.is_err());

    let snapshot = verification.snapshot();
    assert_eq!(snapshot.stage, Stage::HashReady);
    assert_eq!(snapshot.status.unwrap().category, StatusCategory::Warning);
    assert_eq!(snapshot.fingerprint, Some(fingerprint));

    h.ledger.hold_reads.store(false, Ordering::SeqCst);
    let comparison = verification.verify("1").await.unwrap();
    assert_eq!(comparison.verdict, Verdict::Match);
    assert!(verification.stage().is_terminal());
}

#[tokio::test]
async fn test_failed_connect_during_hashing_keeps_its_error() {
    let h = harness(REQUIRED);
    let workflow = h.surface.attestation();

    let (mut writer, reader) = tokio::io::duplex(64);
    let slow = FileHandle::from_reader("slow.bin", 16, reader);
    let pending = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.select_file(slow).await })
    };
    while workflow.stage() != Stage::Hashing {
        tokio::task::yield_now().await;
    }

    h.wallet.reject_requests(Some("user rejected the request"));
    assert!(matches!(workflow.connect().await, Err(WorkflowError::Connection(_))));

    writer.write_all(&[0u8; 16]).await.unwrap();
    drop(writer);
    let fingerprint = pending.await.unwrap().unwrap();

    let snapshot = workflow.snapshot();
    assert!(matches!(snapshot.stage, Stage::Failed(WorkflowError::Connection(_))));
    assert_eq!(snapshot.stage.label(), "failed");
    assert_eq!(snapshot.status.unwrap().category, StatusCategory::Error);
    assert_eq!(snapshot.fingerprint, Some(fingerprint));

    // Reconnecting picks the finished fingerprint back up
    h.wallet.reject_requests(None);
    workflow.connect().await.unwrap();
    assert_eq!(workflow.stage(), Stage::HashReady);
}
