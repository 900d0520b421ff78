//! Frame source -> detector -> hazard policy, without a transport

use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use visionguard_core::{BoundingBox, Detection, Severity};
use visionguard_eye::codec::{decode_data_url, encode_jpeg_data_url};
use visionguard_eye::error::VisionError;
use visionguard_eye::processing::detection::DETECTION_COLOR;
use visionguard_eye::processing::hazard::{HAZARD_CATALOG, HAZARD_COLOR};
use visionguard_eye::{
    Detector, HazardConfig, HazardPolicy, HazardTrigger, NullClassifier, ObjectClassifier, PullSource,
    PushSource, RandomTrigger,
};

struct OnePerson;

impl ObjectClassifier for OnePerson {
    fn name(&self) -> &'static str {
        "one-person"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
        let bbox = BoundingBox::new(100.0, 120.0, 200.0, 300.0)?;
        Ok(vec![Detection::new(0, "person", 0.91, bbox)?])
    }
}

struct FireNow;

impl HazardTrigger for FireNow {
    fn should_fire(&mut self, _now: Instant) -> bool {
        true
    }

    fn pick_type(&mut self) -> String {
        "Weapon Threat".to_string()
    }
}

#[tokio::test]
async fn test_placeholder_frame_through_pipeline() {
    let mut source = PullSource::new(None, (640, 480));
    let detector = Detector::new(Arc::new(NullClassifier));
    let mut policy = HazardPolicy::new(Box::new(RandomTrigger::new(0.0, Some(1))), Duration::from_secs(5));

    let frame = source.next_frame().await;
    let output = detector.detect(&frame).unwrap();
    assert!(output.detections.is_empty());

    let accepted_at = Instant::now();
    let outcome = policy.evaluate(output.annotated, &output.detections, accepted_at, Some(accepted_at));
    assert!(outcome.events.is_empty());
    assert_eq!(outcome.annotated.dimensions(), (640, 480));

    let url = encode_jpeg_data_url(&outcome.annotated, 80).unwrap();
    assert!(url.starts_with("data:image/jpeg;base64,"));
}

#[test]
fn test_pushed_frame_detected_and_hazard_overlaid() {
    let mut source = PushSource::new();
    let client_image = RgbImage::from_pixel(640, 480, Rgb([30, 30, 30]));
    let payload = encode_jpeg_data_url(&client_image, 95).unwrap();
    let frame = tokio_test::block_on(source.accept(payload)).unwrap();

    let detector = Detector::new(Arc::new(OnePerson));
    let output = detector.detect(&frame).unwrap();
    assert_eq!(output.detections.len(), 1);
    assert_eq!(*output.annotated.get_pixel(100, 200), DETECTION_COLOR);

    let mut policy = HazardPolicy::new(Box::new(FireNow), Duration::from_secs(5));
    let now = Instant::now();
    let outcome = policy.evaluate(output.annotated, &output.detections, now, None);
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].severity, Severity::Critical);
    assert_eq!(outcome.last_hazard_at, Some(now));

    // both overlays present
    assert_eq!(*outcome.annotated.get_pixel(100, 200), DETECTION_COLOR);
    assert_eq!(*outcome.annotated.get_pixel(50, 400), HAZARD_COLOR);
}

#[test]
fn test_encoded_output_decodes_to_same_size() {
    let image = RgbImage::from_pixel(320, 200, Rgb([120, 60, 10]));
    let url = encode_jpeg_data_url(&image, 80).unwrap();
    let decoded = decode_data_url(&url).unwrap();
    assert_eq!(decoded.dimensions(), (320, 200));
}

#[test]
fn test_seeded_policies_agree_frame_by_frame() {
    let config = HazardConfig {
        probability: 0.3,
        cooldown_secs: 0.5,
        seed: Some(2024),
        ..HazardConfig::default()
    };
    let mut a = HazardPolicy::from_config(&config).unwrap();
    let mut b = HazardPolicy::from_config(&config).unwrap();

    let start = Instant::now();
    let (mut last_a, mut last_b) = (Some(start), Some(start));
    let mut fired = 0;
    for tick in 0..400u64 {
        let now = start + Duration::from_millis(tick * 50);
        let out_a = a.evaluate(RgbImage::new(64, 48), &[], now, last_a);
        let out_b = b.evaluate(RgbImage::new(64, 48), &[], now, last_b);
        let kinds_a: Vec<_> = out_a.events.iter().map(|e| e.kind.clone()).collect();
        let kinds_b: Vec<_> = out_b.events.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds_a, kinds_b);
        for kind in &kinds_a {
            assert!(HAZARD_CATALOG.contains(&kind.as_str()));
        }
        fired += kinds_a.len();
        last_a = out_a.last_hazard_at;
        last_b = out_b.last_hazard_at;
    }
    assert!(fired > 0);
}
