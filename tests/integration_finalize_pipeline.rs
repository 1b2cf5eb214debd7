#![cfg(feature = "integration-test-api")]

mod support;

use std::fs;

use clip_finalizer_core::compensation::estimate_compensation;
use clip_finalizer_core::events::Settlement;
use clip_finalizer_core::queue::FinalizeRequest;
use clip_finalizer_core::scanner::{FileSortDirection, list_sorted_videos};
use clip_finalizer_core::triplet::{
    delete_video, metadata_path_for_video, read_metadata, thumbnail_path_for_video,
};
use serde_json::json;
use serial_test::serial;
use support::{IntegrationEnv, TEST_KEYFRAME_INTERVAL_SECS};

fn payload(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().expect("object payload")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn finalizes_activity_out_of_long_buffer() {
    let env = IntegrationEnv::new();
    let buffer = env.with_buffer("session.mp4", 90.0);
    let (queue, events) = env.spawn_queue(10.0);

    let request = FinalizeRequest::new(&buffer, 5.0, 20.0)
        .with_name("Match: A/B")
        .with_metadata(payload(json!({ "category": "Arena", "result": "win" })));
    let settlement = queue.enqueue(request).wait().await.expect("settlement");

    let Settlement::Ready(ready) = settlement else {
        panic!("expected ready, got {settlement:?}");
    };
    let video = env.storage_dir().join("session - Match A B.mp4");
    assert_eq!(ready.video_path, video);
    assert!(video.exists());
    assert!(!buffer.exists(), "buffer should be removed after a successful cut");
    assert!(thumbnail_path_for_video(&video).exists());

    let meta = env.metadata(&video);
    assert!(
        meta.duration >= 19.5 && meta.duration <= 20.0 + TEST_KEYFRAME_INTERVAL_SECS as f64 + 0.5,
        "unexpected clip duration {}",
        meta.duration
    );
    assert_eq!(meta.codec_name.as_deref(), Some("h264"));

    // Keyframes every 2 s: the cut at 5 s starts on the keyframe at 4 s.
    let compensation = ready.compensation_seconds.expect("compensation");
    assert!((compensation - 1.0).abs() < 0.05, "compensation {compensation}");

    let sidecar = read_metadata(&video).expect("sidecar");
    assert_eq!(sidecar.video_path, video);
    assert_eq!(sidecar.payload["category"], "Arena");
    assert_eq!(sidecar.payload["result"], "win");
    assert!(sidecar.payload["compensationSeconds"].as_f64().is_some());

    queue.shutdown().await.expect("shutdown");
    assert_eq!(events.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn short_activity_leaves_no_files() {
    let env = IntegrationEnv::new();
    let buffer = env.with_buffer("short.mp4", 12.0);
    let (queue, events) = env.spawn_queue(10.0);

    let settlement = queue
        .enqueue(FinalizeRequest::new(&buffer, 1.0, 9.5).with_name("Skirmish"))
        .wait()
        .await
        .expect("settlement");

    assert!(matches!(settlement, Settlement::Discarded(_)));
    assert!(buffer.exists());
    assert!(!env.storage_dir().exists());
    queue.shutdown().await.expect("shutdown");
    assert_eq!(events.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn back_to_back_requests_each_produce_a_triplet() {
    let env = IntegrationEnv::new();
    let first = env.with_buffer("first.mp4", 30.0);
    let second = env.with_buffer("second.mp4", 30.0);
    let (queue, events) = env.spawn_queue(5.0);

    let metadata = payload(json!({ "zone": "Nagrand" }));
    let a = queue.enqueue(
        FinalizeRequest::new(&first, 3.0, 10.0)
            .with_name("Pull 1")
            .with_metadata(metadata.clone()),
    );
    let b = queue.enqueue(
        FinalizeRequest::new(&second, 7.0, 12.0)
            .with_name("Pull 2")
            .with_metadata(metadata),
    );
    assert!(a.wait().await.expect("first").is_ready());
    assert!(b.wait().await.expect("second").is_ready());
    queue.shutdown().await.expect("shutdown");

    let ids: Vec<u64> = events.lock().iter().map(Settlement::request_id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[0] < ids[1]);

    let clips = list_sorted_videos(&env.storage_dir(), FileSortDirection::OldestFirst)
        .expect("list clips");
    let names: Vec<String> = clips
        .iter()
        .map(|c| c.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, ["first - Pull 1.mp4", "second - Pull 2.mp4"]);
    for clip in &clips {
        assert!(metadata_path_for_video(&clip.path).exists());
        assert!(thumbnail_path_for_video(&clip.path).exists());
    }

    assert!(delete_video(&clips[0].path));
    assert!(!metadata_path_for_video(&clips[0].path).exists());
    assert!(!thumbnail_path_for_video(&clips[0].path).exists());
}

#[test]
#[serial]
fn compensation_matches_keyframe_grid() {
    let env = IntegrationEnv::new();
    let buffer = env.with_buffer("grid.mp4", 12.0);

    let on_keyframe = estimate_compensation(&env.tools, &buffer, 6.0).expect("compensation");
    assert!(on_keyframe.abs() < 0.05, "compensation {on_keyframe}");

    let mid_gop = estimate_compensation(&env.tools, &buffer, 7.5).expect("compensation");
    assert!((mid_gop - 1.5).abs() < 0.05, "compensation {mid_gop}");

    fs::remove_file(&buffer).expect("cleanup");
}
