//! Shared application state injected into every handler

use std::sync::Arc;
use tracing::{info, warn};
use visionguard_eye::camera::{CameraFactory, CaptureDeviceFactory};
use visionguard_eye::{Detector, NullClassifier, ObjectClassifier};
use visionguard_llm::AlertEnricher;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::session::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub detector: Arc<Detector>,
    pub enricher: Arc<AlertEnricher>,
    pub devices: Arc<dyn CaptureDeviceFactory>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        detector: Arc<Detector>,
        enricher: Arc<AlertEnricher>,
        devices: Arc<dyn CaptureDeviceFactory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            detector,
            enricher,
            devices,
        }
    }

    /// Build the production collaborators from configuration
    pub fn from_config(config: ServerConfig, api_key: Option<String>) -> Result<Self> {
        config.validate()?;

        let classifier = build_classifier(&config)?;
        info!("Object classifier: {}", classifier.name());
        let detector = Arc::new(Detector::new(classifier));

        let enricher = Arc::new(AlertEnricher::from_config(config.llm.clone(), api_key));
        if enricher.is_online() {
            info!(
                "Alert enrichment via {} ({})",
                config.llm.provider.as_str(),
                config.llm.model_name()
            );
        } else {
            warn!(
                "{} not set, alerts use the static authority table",
                config.llm.provider.env_var_name()
            );
        }

        let devices: Arc<dyn CaptureDeviceFactory> = Arc::new(CameraFactory::new(config.vision.clone()));
        Ok(Self::new(config, detector, enricher, devices))
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline {
            detector: self.detector.clone(),
            enricher: self.enricher.clone(),
            jpeg_quality: self.config.vision.jpeg_quality,
        }
    }
}

#[cfg(feature = "yolo")]
fn build_classifier(config: &ServerConfig) -> Result<Arc<dyn ObjectClassifier>> {
    use visionguard_eye::models::YoloClassifier;

    match &config.vision.model_path {
        Some(path) => {
            let yolo = YoloClassifier::new(path, config.vision.confidence_threshold, config.vision.iou_threshold)?;
            Ok(Arc::new(yolo))
        }
        None => {
            warn!("No model_path configured, object detection disabled");
            Ok(Arc::new(NullClassifier))
        }
    }
}

#[cfg(not(feature = "yolo"))]
fn build_classifier(config: &ServerConfig) -> Result<Arc<dyn ObjectClassifier>> {
    if config.vision.model_path.is_some() {
        warn!("model_path is set but YOLO support is not compiled in (enable the `yolo` feature)");
    }
    Ok(Arc::new(NullClassifier))
}
