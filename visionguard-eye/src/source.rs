//! Frame source adapter: pull frames from a device or accept client-pushed images

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::camera::CaptureDevice;
use crate::codec;
use crate::frame::Frame;

/// How a connection obtains its frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Server reads a capture device and paces emission itself
    Pull,
    /// Client sends encoded frames; its send rate drives the stream
    Push,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Pull => "pull",
            StreamMode::Push => "push",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pull" => Ok(StreamMode::Pull),
            "push" => Ok(StreamMode::Push),
            other => Err(format!("unknown stream mode '{}' (expected pull or push)", other)),
        }
    }
}

/// Device slot shared with in-flight reads. The lock is only held to move the
/// device in or out, never across a blocking read.
#[derive(Default)]
struct DeviceSlot {
    device: Option<Box<dyn CaptureDevice>>,
    reading: bool,
    stopped: bool,
}

impl DeviceSlot {
    fn checkout(&mut self) -> Option<Box<dyn CaptureDevice>> {
        let device = self.device.take()?;
        self.reading = true;
        Some(device)
    }

    /// Hand a device back after a read. A stop that landed mid-read is honored here.
    fn checkin(&mut self, mut device: Box<dyn CaptureDevice>) {
        self.reading = false;
        if self.stopped {
            device.release();
            info!("Capture device released after in-flight read");
        } else {
            self.device = Some(device);
        }
    }
}

/// Pull-mode source. Owns the device for its whole lifetime and releases it on stop or drop.
pub struct PullSource {
    slot: Arc<Mutex<DeviceSlot>>,
    placeholder_size: (u32, u32),
    next_index: u64,
    warned_no_frame: bool,
}

impl PullSource {
    pub fn new(device: Option<Box<dyn CaptureDevice>>, placeholder_size: (u32, u32)) -> Self {
        if device.is_none() {
            warn!("No capture device available, streaming placeholder frames");
        }
        Self {
            slot: Arc::new(Mutex::new(DeviceSlot {
                device,
                ..DeviceSlot::default()
            })),
            placeholder_size,
            next_index: 0,
            warned_no_frame: false,
        }
    }

    /// Next frame; never fails. Substitutes a placeholder when the device yields nothing.
    pub async fn next_frame(&mut self) -> Frame {
        let index = self.next_index;
        self.next_index += 1;

        let checked_out = self.slot.lock().checkout();
        let image = match checked_out {
            Some(mut device) => {
                let slot = self.slot.clone();
                // Runs to completion even if this future is dropped; the device
                // goes back to the slot, or is released if the source stopped meanwhile.
                let read = tokio::task::spawn_blocking(move || {
                    let result = device.read_frame();
                    slot.lock().checkin(device);
                    result
                })
                .await;

                match read {
                    Ok(Ok(image)) => image,
                    Ok(Err(e)) => {
                        warn!("Camera read error on frame {}: {}", index, e);
                        None
                    }
                    Err(e) => {
                        warn!("Camera read task failed on frame {}: {}", index, e);
                        None
                    }
                }
            }
            None => None,
        };

        match image {
            Some(image) => {
                self.warned_no_frame = false;
                Frame::new(index, image)
            }
            None => {
                if !self.warned_no_frame {
                    warn!("Capture source yielded no frame, substituting placeholder");
                    self.warned_no_frame = true;
                }
                let (width, height) = self.placeholder_size;
                Frame::placeholder(index, width, height)
            }
        }
    }

    pub fn has_device(&self) -> bool {
        let slot = self.slot.lock();
        !slot.stopped && (slot.device.is_some() || slot.reading)
    }

    /// Release the device. Idempotent and non-blocking: if a read is in flight,
    /// the reading task releases the device when the read returns.
    pub fn stop(&mut self) {
        let idle = {
            let mut slot = self.slot.lock();
            slot.stopped = true;
            slot.device.take()
        };
        if let Some(mut device) = idle {
            device.release();
            info!("Capture device released");
        }
    }
}

impl Drop for PullSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Push-mode source: decodes client-supplied images
#[derive(Debug, Default)]
pub struct PushSource {
    next_index: u64,
}

impl PushSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one client payload off the async executor; `None` means skip this tick
    pub async fn accept(&mut self, payload: String) -> Option<Frame> {
        let decoded = tokio::task::spawn_blocking(move || codec::decode_data_url(&payload)).await;
        match decoded {
            Ok(Ok(image)) => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Frame::new(index, image))
            }
            Ok(Err(e)) => {
                debug!("Dropping undecodable client frame: {}", e);
                None
            }
            Err(e) => {
                warn!("Client frame decode task failed: {}", e);
                None
            }
        }
    }
}

/// The frame source selected for a connection at setup
pub enum FrameSource {
    Pull(PullSource),
    Push(PushSource),
}

impl FrameSource {
    pub fn mode(&self) -> StreamMode {
        match self {
            FrameSource::Pull(_) => StreamMode::Pull,
            FrameSource::Push(_) => StreamMode::Push,
        }
    }

    /// Release any owned device
    pub fn release(&mut self) {
        if let FrameSource::Pull(source) = self {
            source.stop();
        }
    }
}
