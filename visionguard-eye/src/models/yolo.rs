//! YOLOv8 object detection over ONNX Runtime

use image::{imageops::FilterType, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};
use visionguard_core::{BoundingBox, Detection};

use super::classifier::ObjectClassifier;
use crate::error::VisionError;

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

const INPUT_SIZE: u32 = 640;
const MAX_DETECTIONS: usize = 100;

/// YOLOv8 classifier; expects an export with output `[1, 4 + classes, anchors]`
pub struct YoloClassifier {
    session: Mutex<Session>,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloClassifier {
    pub fn new(model_path: &Path, confidence_threshold: f32, iou_threshold: f32) -> Result<Self, VisionError> {
        let builder = Session::builder()
            .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?;
        let builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::Ort(format!("Failed to set optimization level: {}", e)))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| VisionError::Ort(format!("Failed to load YOLO model: {}", e)))?;

        info!("YOLO model loaded from {:?}", model_path);

        Ok(Self {
            session: Mutex::new(session),
            confidence_threshold,
            iou_threshold,
        })
    }

    /// Resize to the model input and lay out as normalized CHW
    fn preprocess(image: &RgbImage) -> Vec<f32> {
        let resized = image::imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for (i, pixel) in resized.pixels().enumerate() {
            data[i] = pixel[0] as f32 / 255.0;
            data[plane + i] = pixel[1] as f32 / 255.0;
            data[2 * plane + i] = pixel[2] as f32 / 255.0;
        }
        data
    }

    fn postprocess(&self, dims: &[i64], raw: &[f32], width: u32, height: u32) -> Vec<Detection> {
        if dims.len() != 3 {
            return Vec::new();
        }
        let num_classes = COCO_CLASSES.len();
        let channels = 4 + num_classes;
        let (anchors, channel_major) = if dims[1] as usize == channels {
            (dims[2] as usize, true)
        } else if dims[2] as usize == channels {
            (dims[1] as usize, false)
        } else {
            debug!("Unexpected YOLO output shape {:?}", dims);
            return Vec::new();
        };
        if raw.len() < anchors * channels {
            return Vec::new();
        }

        let at = |channel: usize, anchor: usize| -> f32 {
            if channel_major {
                raw[channel * anchors + anchor]
            } else {
                raw[anchor * channels + channel]
            }
        };

        let scale_x = width as f32 / INPUT_SIZE as f32;
        let scale_y = height as f32 / INPUT_SIZE as f32;
        let mut detections = Vec::new();

        for anchor in 0..anchors {
            let (class_id, score) = (0..num_classes)
                .map(|c| (c, at(4 + c, anchor)))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if !score.is_finite() || score < self.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
            let x1 = ((cx - w / 2.0) * scale_x).clamp(0.0, width as f32);
            let y1 = ((cy - h / 2.0) * scale_y).clamp(0.0, height as f32);
            let x2 = ((cx + w / 2.0) * scale_x).clamp(0.0, width as f32);
            let y2 = ((cy + h / 2.0) * scale_y).clamp(0.0, height as f32);

            let Ok(bbox) = BoundingBox::new(x1, y1, x2, y2) else {
                continue;
            };
            if let Ok(detection) = Detection::new(class_id, COCO_CLASSES[class_id], score.min(1.0), bbox) {
                detections.push(detection);
            }
        }

        apply_nms(detections, self.iou_threshold)
    }
}

impl ObjectClassifier for YoloClassifier {
    fn name(&self) -> &'static str {
        "yolov8"
    }

    fn classify(&self, image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
        let input = Self::preprocess(image);
        let shape = [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize];
        let tensor = Tensor::from_array((shape, input.into_boxed_slice()))
            .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| VisionError::Ort(format!("YOLO inference failed: {}", e)))?;
        let (shape, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let detections = self.postprocess(&dims, raw, image.width(), image.height());
        debug!("YOLO detected {} objects", detections.len());
        Ok(detections)
    }
}

/// Per-class non-maximum suppression, highest confidence first
fn apply_nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
        if keep.len() >= MAX_DETECTIONS {
            break;
        }
    }
    keep
}
