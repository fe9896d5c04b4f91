//! Multi-worker coordination integration tests.
//!
//! Several hosts share one source store and one output sink. There is no
//! compare-and-swap on tags, so these tests check eventual correctness:
//! every job ends up uploaded and deleted, whatever the interleaving.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use dashcoder_core::{
    lease::LeaseManager,
    testing::{fixtures::lease_tags, MockJobStore, MockOutputSink, MockTranscoder},
    EncodeOrchestrator, HostIdentity, OrchestratorConfig,
};

fn config(dir: &TempDir) -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_millis(15),
        lease_timeout: Duration::from_secs(3600),
        shutdown_grace: Duration::from_secs(5),
        completion_drain: Duration::from_secs(5),
        download_dir: dir.path().to_path_buf(),
        max_concurrent_completions: Some(2),
    }
}

#[tokio::test]
async fn fleet_drains_every_job() {
    let store = MockJobStore::new();
    let sink = MockOutputSink::new();
    let jobs: Vec<String> = (0..6).map(|i| format!("upload-{i}.mp4")).collect();
    for id in &jobs {
        store.insert(id, b"media").await;
    }

    let dirs: Vec<TempDir> = (0..3).map(|_| TempDir::new().unwrap()).collect();
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for (i, dir) in dirs.iter().enumerate() {
        let transcoder = MockTranscoder::new();
        transcoder.set_encode_duration(Duration::from_millis(10)).await;
        let orchestrator = EncodeOrchestrator::new(
            config(dir),
            Arc::new(store.clone()),
            Arc::new(sink.clone()),
            Arc::new(transcoder),
            HostIdentity::new(format!("host-{i}")),
        );
        handles.push(tokio::spawn(orchestrator.run(cancel.clone())));
    }

    for _ in 0..300 {
        if store.ids().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.ids().await.is_empty(), "sources left: {:?}", store.ids().await);

    cancel.cancel();
    let mut claims = 0;
    for handle in handles {
        claims += handle.await.unwrap().unwrap().claims;
    }
    assert!(claims >= jobs.len());

    for id in &jobs {
        assert!(sink.upload_count(id).await >= 1, "{id} never uploaded");
        assert!(sink.object(&format!("{id}/dash.mpd")).await.is_some());
    }
}

#[tokio::test]
async fn two_hosts_never_take_a_live_lease_from_each_other() {
    let store = MockJobStore::new();
    store.insert("shared.mp4", b"media").await;
    let dir = TempDir::new().unwrap();

    let h1 = LeaseManager::new(
        Arc::new(store.clone()),
        HostIdentity::new("h1"),
        Duration::from_secs(3600),
        dir.path().to_path_buf(),
    );
    let h2 = LeaseManager::new(
        Arc::new(store.clone()),
        HostIdentity::new("h2"),
        Duration::from_secs(3600),
        dir.path().to_path_buf(),
    );

    let first = h1.acquire_one().await.unwrap();
    assert!(first.is_some());
    assert!(h2.acquire_one().await.unwrap().is_none());
    assert!(h1.acquire_one().await.unwrap().is_none());
}

#[tokio::test]
async fn crashed_host_lease_is_picked_up_after_timeout() {
    let store = MockJobStore::new();
    let sink = MockOutputSink::new();
    // Claimed by a host that died three hours ago.
    store
        .insert_tagged(
            "orphan.mp4",
            b"media",
            lease_tags("dead-host", Utc::now() - ChronoDuration::hours(3)),
        )
        .await;

    let dir = TempDir::new().unwrap();
    let orchestrator = EncodeOrchestrator::new(
        config(&dir),
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        Arc::new(MockTranscoder::new()),
        HostIdentity::new("survivor"),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(orchestrator.run(cancel.clone()));

    for _ in 0..200 {
        if !store.contains("orphan.mp4").await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    let status = handle.await.unwrap().unwrap();
    assert_eq!(status.claims, 1);
    assert_eq!(sink.upload_count("orphan.mp4").await, 1);
    assert!(!store.contains("orphan.mp4").await);
}
