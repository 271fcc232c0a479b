mod loop_worker;
mod session;

pub use session::DecoderSession;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DecodeEvent;

/// Failures surfaced when acquiring or reading the input device.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DecoderError {
    #[error("no usable input device")]
    DeviceUnavailable,
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("input device is held by another consumer")]
    DeviceBusy,
    #[error("input device failure: {0}")]
    Unreadable(String),
}

/// An input device as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

/// Decode region hint, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBox {
    pub width: u32,
    pub height: u32,
}

/// Decode-loop tuning handed to the backend when a device is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecoderConfig {
    pub fps: u32,
    pub scan_box: Option<ScanBox>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            scan_box: Some(ScanBox {
                width: 250,
                height: 250,
            }),
        }
    }
}

impl DecoderConfig {
    pub(crate) fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

/// The opaque decode capability supplied by the host: device discovery plus
/// acquisition. The pixel-decoding algorithm behind [`FrameSource`] is not
/// this crate's concern.
pub trait DecodeBackend: Send + Sync {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, DecoderError>;

    /// Acquire the device and return a stream of decode attempts.
    fn open(
        &self,
        device_id: &str,
        config: &DecoderConfig,
    ) -> Result<Box<dyn FrameSource>, DecoderError>;
}

/// One decode attempt per call. `Ok(None)` means no code in this frame,
/// which happens on nearly every frame and is filtered by the decode loop
/// rather than reported. `Err` is a genuine device failure. Dropping the
/// source releases the device.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<String>, DecoderError>;
}

/// What the decode loop emits to its single consumer.
#[derive(Debug, Clone)]
pub enum DecoderEvent {
    Decoded(DecodeEvent),
    /// Terminal: the loop exits after sending this.
    Fault(DecoderError),
}

/// Favour a back/environment-facing camera when the labels reveal one (the
/// usual choice on a phone), else take the first device.
pub fn pick_default_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices
        .iter()
        .find(|device| {
            let label = device.label.to_lowercase();
            label.contains("back") || label.contains("environment")
        })
        .or_else(|| devices.first())
}
