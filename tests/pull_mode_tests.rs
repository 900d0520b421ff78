// End-to-end pull-mode tests: server-driven frame pacing and device lifecycle

mod common;

use async_trait::async_trait;
use common::*;
use futures_util::StreamExt;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use visionguard_eye::camera::{CaptureDevice, CaptureDeviceFactory, NoDeviceFactory};
use visionguard_eye::codec::decode_data_url;
use tokio_tungstenite::tungstenite::Message;
use visionguard_core::Detection;
use visionguard_eye::{Detector, ObjectClassifier, VisionError};
use visionguard_llm::{AlertEnricher, ChatRequest, ChatResponse, LLMConfig, ProviderTrait};
use visionguard_server::AppState;

const WAIT: Duration = Duration::from_secs(5);

/// Device that counts opens and releases across connections
struct CountingFactory {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

struct CountingDevice {
    released: Arc<AtomicUsize>,
}

impl CaptureDevice for CountingDevice {
    fn read_frame(&mut self) -> Result<Option<RgbImage>, VisionError> {
        Ok(Some(RgbImage::from_pixel(160, 120, Rgb([30, 60, 90]))))
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl CaptureDeviceFactory for CountingFactory {
    fn open(&self) -> Option<Box<dyn CaptureDevice>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(CountingDevice {
            released: self.released.clone(),
        }))
    }
}

/// Classifier that fails every inference
struct BrokenClassifier;

impl ObjectClassifier for BrokenClassifier {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
        Err(VisionError::Model("inference session lost".to_string()))
    }
}

/// Provider whose chat call never completes
struct HangingProvider {
    called: Arc<Notify>,
}

#[async_trait]
impl ProviderTrait for HangingProvider {
    fn name(&self) -> &'static str {
        "hanging"
    }

    fn has_api_key(&self) -> bool {
        true
    }

    async fn chat(&self, _request: ChatRequest) -> visionguard_llm::Result<ChatResponse> {
        self.called.notify_one();
        std::future::pending().await
    }
}

async fn wait_for(counter: &AtomicUsize, expected: usize, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if counter.load(Ordering::SeqCst) == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    counter.load(Ordering::SeqCst) == expected
}

#[tokio::test]
async fn test_placeholder_frames_stream_without_camera() {
    let mut config = quiet_config();
    config.vision.frame_rate = 20;
    let addr = spawn_server(offline_state(config)).await;
    let mut client = connect(addr, "pull").await;

    for _ in 0..3 {
        let update = next_json(&mut client, WAIT).await.expect("placeholder frame");
        assert_eq!(update["type"], "frame_update");
        assert_eq!(update["alerts"], serde_json::json!([]));
        let image = decode_data_url(update["image"].as_str().unwrap()).unwrap();
        assert_eq!(image.dimensions(), (160, 120));
    }
}

#[tokio::test]
async fn test_pull_mode_ignores_client_frames() {
    let mut config = quiet_config();
    config.vision.frame_rate = 20;
    let addr = spawn_server(offline_state(config)).await;
    let mut client = connect(addr, "pull").await;

    send(&mut client, client_frame(&RgbImage::new(32, 24))).await;
    for _ in 0..3 {
        let update = next_json(&mut client, WAIT).await.unwrap();
        let image = decode_data_url(update["image"].as_str().unwrap()).unwrap();
        assert_eq!(image.dimensions(), (160, 120));
    }
}

#[tokio::test]
async fn test_default_mode_applies_without_query() {
    let mut config = quiet_config();
    config.vision.frame_rate = 20;
    let addr = spawn_server(state_with(config, AlertEnricher::offline(), Arc::new(NoDeviceFactory))).await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/stream", addr))
        .await
        .unwrap();
    assert!(next_json(&mut client, WAIT).await.is_some());
}

#[tokio::test]
async fn test_device_released_once_on_disconnect() {
    let opened = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));
    let factory = CountingFactory {
        opened: opened.clone(),
        released: released.clone(),
    };
    let mut config = quiet_config();
    config.vision.frame_rate = 20;
    let addr = spawn_server(state_with(config, AlertEnricher::offline(), Arc::new(factory))).await;

    let mut client = connect(addr, "pull").await;
    assert!(next_json(&mut client, WAIT).await.is_some());
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    client.close(None).await.unwrap();
    assert!(wait_for(&released, 1, Duration::from_secs(2)).await);

    // no double release after the session is gone
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disconnect_during_enrichment_releases_device() {
    let released = Arc::new(AtomicUsize::new(0));
    let factory = CountingFactory {
        opened: Arc::new(AtomicUsize::new(0)),
        released: released.clone(),
    };
    let called = Arc::new(Notify::new());
    let provider = HangingProvider { called: called.clone() };
    let llm = LLMConfig {
        timeout_secs: 120.0,
        ..LLMConfig::default()
    };
    let enricher = AlertEnricher::new(Arc::new(provider), llm);

    let addr = spawn_server(state_with(hazardous_config(), enricher, Arc::new(factory))).await;
    let mut client = connect(addr, "pull").await;

    // first frame fires a hazard and blocks in enrichment
    tokio::time::timeout(WAIT, called.notified()).await.expect("enrichment started");

    client.close(None).await.unwrap();
    assert!(wait_for(&released, 1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_each_connection_opens_its_own_device() {
    let opened = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));
    let factory = CountingFactory {
        opened: opened.clone(),
        released: released.clone(),
    };
    let mut config = quiet_config();
    config.vision.frame_rate = 20;
    let addr = spawn_server(state_with(config, AlertEnricher::offline(), Arc::new(factory))).await;

    let mut first = connect(addr, "pull").await;
    let mut second = connect(addr, "pull").await;
    assert!(next_json(&mut first, WAIT).await.is_some());
    assert!(next_json(&mut second, WAIT).await.is_some());
    assert_eq!(opened.load(Ordering::SeqCst), 2);

    first.close(None).await.unwrap();
    assert!(wait_for(&released, 1, Duration::from_secs(2)).await);

    // the other stream keeps going
    assert!(next_json(&mut second, WAIT).await.is_some());

    second.close(None).await.unwrap();
    assert!(wait_for(&released, 2, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_detector_failure_closes_stream_and_releases_device() {
    // healthy server, streaming before the other one fails
    let healthy_addr = spawn_server(offline_state(quiet_config())).await;
    let mut healthy = connect(healthy_addr, "pull").await;
    assert!(next_json(&mut healthy, WAIT).await.is_some());

    let released = Arc::new(AtomicUsize::new(0));
    let factory = CountingFactory {
        opened: Arc::new(AtomicUsize::new(0)),
        released: released.clone(),
    };
    let broken = AppState::new(
        quiet_config(),
        Arc::new(Detector::new(Arc::new(BrokenClassifier))),
        Arc::new(AlertEnricher::offline()),
        Arc::new(factory),
    );
    let broken_addr = spawn_server(broken).await;
    let mut client = connect(broken_addr, "pull").await;

    let mut closed = false;
    let deadline = tokio::time::Instant::now() + WAIT;
    while let Ok(Some(message)) = tokio::time::timeout_at(deadline, client.next()).await {
        match message {
            Ok(Message::Text(text)) => panic!("unexpected message after failure: {}", text),
            Ok(Message::Close(_)) => {
                closed = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    assert!(closed, "expected a Close frame");
    assert!(wait_for(&released, 1, Duration::from_secs(2)).await);

    // released exactly once across the Failed transition and teardown
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(released.load(Ordering::SeqCst), 1);

    // sibling connection unaffected
    for _ in 0..3 {
        let update = next_json(&mut healthy, WAIT).await.expect("healthy stream keeps going");
        assert_eq!(update["type"], "frame_update");
    }
}
