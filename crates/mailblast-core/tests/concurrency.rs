//! A campaign never has two dispatches in flight

mod common;

use common::{abc, ready_config, FakeService};
use mailblast_core::{CampaignSession, FileUpload, Stage};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_duplicate_dispatch_rejected_while_pending() {
    let service = FakeService::gated().with_import(abc());
    let session = Arc::new(CampaignSession::new(service.clone(), ready_config()));

    session.advance().await.unwrap();
    session
        .import(FileUpload::new("list.xlsx", b"xlsx".to_vec()))
        .await
        .unwrap();
    session.advance().await.unwrap();

    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.send().await }
    });

    let gate = service.gate.as_ref().unwrap();
    gate.dispatch_started.notified().await;

    let err = session.send().await.unwrap_err();
    assert_eq!(err.code(), "DISPATCH_IN_FLIGHT");
    assert!(session.snapshot().await.dispatch.is_in_flight());
    assert_eq!(service.dispatch_count(), 1);

    // Leaving for Review by any other route is blocked as well
    assert_eq!(
        session.retry_failed().await.unwrap_err().code(),
        "DISPATCH_IN_FLIGHT"
    );

    gate.release.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.summary.total, 3);
    assert_eq!(session.stage().await, Stage::Review);
    assert!(!session.snapshot().await.dispatch.is_in_flight());
    assert_eq!(service.dispatch_count(), 1);
}

#[tokio::test]
async fn test_import_and_upload_run_alongside_each_other() {
    let service = FakeService::new().with_import(abc());
    let session = Arc::new(CampaignSession::new(service, ready_config()));
    session.advance().await.unwrap();

    let import = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .import(FileUpload::new("list.xlsx", b"xlsx".to_vec()))
                .await
        })
    };
    let upload = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .upload_attachment(FileUpload::new("guide.pdf", b"%PDF".to_vec()))
                .await
        })
    };

    let (import, upload) = tokio::time::timeout(Duration::from_secs(5), async {
        (import.await, upload.await)
    })
    .await
    .unwrap();
    import.unwrap().unwrap();
    upload.unwrap().unwrap();

    let state = session.snapshot().await;
    assert_eq!(state.recipients.len(), 3);
    assert_eq!(state.config.draft.common_attachments, vec!["uploads/guide.pdf"]);
}

#[tokio::test]
async fn test_abandoned_dispatch_releases_the_campaign() {
    let service = FakeService::gated().with_import(abc());
    let session = CampaignSession::new(service.clone(), ready_config());

    session.advance().await.unwrap();
    session
        .import(FileUpload::new("list.xlsx", b"xlsx".to_vec()))
        .await
        .unwrap();
    session.advance().await.unwrap();

    // The gate is never opened, so the caller's timeout drops the send
    let timed_out = tokio::time::timeout(Duration::from_millis(50), session.send()).await;
    assert!(timed_out.is_err());

    let state = session.snapshot().await;
    assert!(!state.dispatch.is_in_flight());
    assert_eq!(state.stage, Stage::Compose);
    assert!(state.last_outcome.is_none());

    // The whole batch can be resubmitted
    service.gate.as_ref().unwrap().release.notify_one();
    let report = session.send().await.unwrap();
    assert_eq!(report.summary.total, 3);
    assert_eq!(service.dispatch_count(), 2);
    assert_eq!(session.stage().await, Stage::Review);

    session.reset().await.unwrap();
    assert_eq!(session.stage().await, Stage::Configure);
}
