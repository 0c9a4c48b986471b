//! Merge polling and metadata storage, run on a manual clock.

use std::time::Duration;

use sealdrop_api::memory::ScriptedStatus;
use sealdrop_api::MemoryShareApi;
use sealdrop_core::types::MergeStatus;
use sealdrop_core::ShareError;
use sealdrop_flow::{FileOptions, FinalizeState, ManualClock, SendSettings, Sender};
use sealdrop_crypto::PasswordParams;

fn settings() -> SendSettings {
    SendSettings {
        share_base: "https://share.example.com/".into(),
        chunk_size: 1024,
        poll_interval: Duration::from_secs(3),
        max_attempts: 20,
        password_params: PasswordParams { iterations: 1000 },
    }
}

fn statuses(pending: usize, then: Option<MergeStatus>) -> Vec<ScriptedStatus> {
    let mut script = vec![ScriptedStatus::Status(MergeStatus::Pending); pending];
    script.extend(then.map(ScriptedStatus::Status));
    script
}

#[tokio::test]
async fn completes_on_sixth_poll() {
    let api = MemoryShareApi::new();
    api.script_status(statuses(5, Some(MergeStatus::Completed)));
    let clock = ManualClock::new();

    let link = Sender::new(&api, &clock, settings())
        .send_file("doc.pdf", &[3u8; 3000], FileOptions::default())
        .await
        .unwrap();

    assert_eq!(api.calls().upload_status, 6);
    assert_eq!(api.calls().store_metadata, 1);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(3); 6]);
    assert!(api.record(link.id()).is_some());
}

#[tokio::test]
async fn twenty_one_pending_responses_time_out() {
    let api = MemoryShareApi::new();
    // Mix of 404 and completed:false, one more than the ceiling
    let mut script = statuses(11, None);
    script.extend(vec![ScriptedStatus::Status(MergeStatus::Unknown); 10]);
    api.script_status(script);
    let clock = ManualClock::new();

    let err = Sender::new(&api, &clock, settings())
        .send_file("doc.pdf", &[3u8; 3000], FileOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ShareError::Timeout { attempts: 20 }));
    assert_eq!(api.calls().upload_status, 20);
    assert_eq!(api.calls().store_metadata, 0);
    assert_eq!(clock.elapsed(), Duration::from_secs(60));
}

#[tokio::test]
async fn metadata_failure_is_terminal() {
    let api = MemoryShareApi::new();
    api.fail_metadata(500);
    let clock = ManualClock::new();

    let err = Sender::new(&api, &clock, settings())
        .send_file("doc.pdf", &[3u8; 100], FileOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ShareError::MetadataStore { status: 500, .. }));
    assert_eq!(api.calls().store_metadata, 1, "no automatic retry");
}

#[tokio::test]
async fn coordinator_reports_ready_state() {
    use sealdrop_api::ShareApi;
    use sealdrop_core::types::{ChunkUpload, InitUploadRequest, StoreMetadataRequest};
    use sealdrop_flow::FinalizeCoordinator;

    let api = MemoryShareApi::new();
    let upload_id = api
        .init_upload(&InitUploadRequest {
            file_name: "x".into(),
            file_size: 4,
        })
        .await
        .unwrap()
        .upload_id
        .unwrap();
    api.upload_chunk(ChunkUpload {
        upload_id: upload_id.clone(),
        chunk_number: 1,
        total_chunks: 1,
        file_name: "x".into(),
        file_size: 4,
        bytes: vec![1, 2, 3, 4],
    })
    .await
    .unwrap();

    let clock = ManualClock::new();
    let mut coord = FinalizeCoordinator::new(&api, &clock, Duration::from_millis(10), 3);
    let finalized = coord
        .finalize(
            &StoreMetadataRequest {
                id: upload_id.clone(),
                iv: "aXY=".into(),
                salt: "c2FsdA==".into(),
                original_filename: "x".into(),
                content_type: "application/octet-stream".into(),
                file_size: 4,
                password_protection: None,
                set_duration: None,
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(finalized.record_id, upload_id);
    assert_eq!(finalized.attempts, 1);
    assert_eq!(
        coord.state(),
        &FinalizeState::Ready {
            record_id: upload_id
        }
    );
}
