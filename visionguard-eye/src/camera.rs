//! Capture device abstraction and USB webcam backend

use image::RgbImage;
use tracing::warn;

use crate::config::VisionConfig;
use crate::error::VisionError;

/// A blocking source of RGB frames, exclusively owned by one connection
pub trait CaptureDevice: Send {
    /// Read the next frame; `Ok(None)` when the device has nothing to give
    fn read_frame(&mut self) -> Result<Option<RgbImage>, VisionError>;

    /// Release the underlying handle. Called once, on every exit path.
    fn release(&mut self);
}

/// Opens a fresh capture device for each pull-mode connection
pub trait CaptureDeviceFactory: Send + Sync {
    /// `None` when no device is available; the caller substitutes placeholder frames
    fn open(&self) -> Option<Box<dyn CaptureDevice>>;
}

/// Factory for the configured USB camera
pub struct CameraFactory {
    config: VisionConfig,
}

impl CameraFactory {
    pub fn new(config: VisionConfig) -> Self {
        Self { config }
    }
}

impl CaptureDeviceFactory for CameraFactory {
    #[cfg(feature = "camera")]
    fn open(&self) -> Option<Box<dyn CaptureDevice>> {
        match opencv_backend::OpenCvCamera::open(&self.config) {
            Ok(camera) => Some(Box::new(camera)),
            Err(e) => {
                warn!("Camera {} unavailable: {}", self.config.camera_id, e);
                None
            }
        }
    }

    #[cfg(not(feature = "camera"))]
    fn open(&self) -> Option<Box<dyn CaptureDevice>> {
        warn!(
            "Camera {} requested but capture support is not compiled in (enable the `camera` feature)",
            self.config.camera_id
        );
        None
    }
}

#[cfg(feature = "camera")]
pub use opencv_backend::OpenCvCamera;

#[cfg(feature = "camera")]
mod opencv_backend {
    use super::CaptureDevice;
    use crate::config::VisionConfig;
    use crate::error::VisionError;
    use image::RgbImage;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
    };
    use tracing::info;

    /// USB webcam via OpenCV VideoCapture
    pub struct OpenCvCamera {
        camera_id: u32,
        capture: VideoCapture,
    }

    impl OpenCvCamera {
        pub fn open(config: &VisionConfig) -> Result<Self, VisionError> {
            let mut capture = VideoCapture::new(config.camera_id as i32, CAP_ANY)
                .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", config.camera_id, e)))?;

            if !capture.is_opened()? {
                return Err(VisionError::Camera(format!("Camera {} failed to open", config.camera_id)));
            }

            capture.set(CAP_PROP_FRAME_WIDTH, config.resolution.0 as f64)?;
            capture.set(CAP_PROP_FRAME_HEIGHT, config.resolution.1 as f64)?;
            capture.set(CAP_PROP_FPS, config.frame_rate as f64)?;

            info!(
                "Camera {} initialized at {}x{} @ {}fps",
                config.camera_id, config.resolution.0, config.resolution.1, config.frame_rate
            );

            Ok(Self {
                camera_id: config.camera_id,
                capture,
            })
        }
    }

    impl CaptureDevice for OpenCvCamera {
        fn read_frame(&mut self) -> Result<Option<RgbImage>, VisionError> {
            let mut frame = Mat::default();
            if !self.capture.read(&mut frame)? || frame.empty() {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let width = rgb.cols().max(0) as u32;
            let height = rgb.rows().max(0) as u32;
            let bytes = rgb.data_bytes()?.to_vec();
            Ok(RgbImage::from_raw(width, height, bytes))
        }

        fn release(&mut self) {
            if let Err(e) = self.capture.release() {
                tracing::warn!("Failed to release camera {}: {}", self.camera_id, e);
            } else {
                info!("Camera {} released", self.camera_id);
            }
        }
    }
}

/// Factory that never yields a device; every pull-mode frame is a placeholder
pub struct NoDeviceFactory;

impl CaptureDeviceFactory for NoDeviceFactory {
    fn open(&self) -> Option<Box<dyn CaptureDevice>> {
        None
    }
}
